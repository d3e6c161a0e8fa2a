use std::thread;

use scs_rs::{
    conn::mem,
    proto::{
        cmd::{Action, RegWrite},
        register,
        reply::ReplyLayout,
        ServoId, BROADCAST_ID,
    },
    servo::{Controller, ControllerConfig, DEFAULT_SETTLE},
    sim::VirtualBus,
    Error,
};

fn spawn_bus(ids: &[u8]) -> (mem::MemPort, thread::JoinHandle<VirtualBus>) {
    let (port, mut peer) = mem::pair();
    let mut bus = VirtualBus::new().with_echo(true);
    for &id in ids {
        bus.add_servo(ServoId(id));
    }

    let handle = thread::spawn(move || {
        bus.serve(&mut peer).expect("serve virtual bus");
        bus
    });

    (port, handle)
}

#[test]
fn drive_servos_through_a_threaded_bus() {
    let (port, handle) = spawn_bus(&[1, 2, 5]);
    let mut ctrl = Controller::new(
        port,
        ControllerConfig::new(
            vec![ServoId(1), ServoId(2)],
            Some(ReplyLayout::Status),
            Some(DEFAULT_SETTLE),
            None,
        ),
    );

    let status = ctrl.ping(ServoId(5)).expect("ping");
    assert_eq!(status.id, ServoId(5));

    ctrl.set_torque(ServoId(1), true).expect("torque on");
    assert_eq!(
        ctrl.move_many(&[(ServoId(1), 180), (ServoId(2), 1), (ServoId(5), 90)])
            .expect("move"),
        2
    );

    // goal positions span 1..=1023 while present positions are reported on 1..=1000
    assert_eq!(ctrl.read_position(ServoId(1)).expect("read 1"), 184);
    assert_eq!(ctrl.read_position(ServoId(2)).expect("read 2"), 1);
    assert!(matches!(
        ctrl.read_position(ServoId(5)),
        Err(Error::NotConfigured(5))
    ));

    ctrl.send_cmd(&RegWrite::new(
        ServoId(2),
        register::TORQUE_ENABLE,
        vec![1],
    ))
    .expect("stage torque");
    ctrl.send_cmd(&Action::new(BROADCAST_ID)).expect("action");
    assert_eq!(ctrl.release(&[ServoId(1)]).expect("release"), 1);

    // make sure the bus handled everything before hanging up
    ctrl.ping(ServoId(1)).expect("final ping");

    drop(ctrl);
    let bus = handle.join().expect("bus thread");
    assert!(!bus.servo(ServoId(1)).unwrap().torque_enabled());
    assert!(bus.servo(ServoId(2)).unwrap().torque_enabled());
    assert_eq!(bus.servo(ServoId(5)).unwrap().present_position(), 512);
}

#[test]
fn silent_servo_is_a_recoverable_failure() {
    let (port, handle) = spawn_bus(&[1]);
    let mut ctrl = Controller::new(
        port,
        ControllerConfig::new(
            vec![ServoId(1), ServoId(7)],
            Some(ReplyLayout::Status),
            Some(DEFAULT_SETTLE),
            None,
        ),
    );

    // only the echo of the request comes back
    assert!(matches!(
        ctrl.read_position(ServoId(7)),
        Err(Error::MalformedReply { got: 0, .. })
    ));

    // the controller is still usable afterwards
    ctrl.set_position_raw(ServoId(1), 1000).expect("raw move");
    assert_eq!(ctrl.read_position(ServoId(1)).expect("read"), 180);

    drop(ctrl);
    handle.join().expect("bus thread");
}
