use std::{env, net::SocketAddr, process};

use scs_rs::{
    conn::{Serial, Tcp, Transport},
    proto::{reply::ReplyLayout, ServoId, VirtualPort},
    servo::{Controller, ControllerConfig},
};

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str =
    "usage: scs_demo <serial device|bridge addr> <ping|move|raw|release|limits|read> <port> [value] [value]";

pub fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("{}", USAGE);
        process::exit(2);
    }

    let port: VirtualPort = args[3].parse().expect("parse virtual port");
    let id = ServoId::from(port);
    let value = |idx: usize| -> i32 {
        args.get(idx)
            .expect("missing value")
            .parse()
            .expect("parse value")
    };

    let (transport, layout) = match args[1].parse::<SocketAddr>() {
        Ok(bridge_addr) => {
            info!("serial bridge: {}", bridge_addr);
            let tcp = Tcp::connect(None, bridge_addr).expect("connect serial bridge");
            (Box::new(tcp) as Box<dyn Transport>, ReplyLayout::Reversed)
        }

        Err(_) => {
            info!("serial port: {}", args[1]);
            let serial = Serial::open(&args[1], None).expect("open serial port");
            (Box::new(serial) as Box<dyn Transport>, ReplyLayout::FixedOffset)
        }
    };
    let mut ctrl = Controller::new(
        transport,
        ControllerConfig::new(vec![id], Some(layout), None, None),
    );

    let res = match args[2].as_str() {
        "ping" => ctrl.ping(id).map(|status| {
            info!(%port, error = status.error, "pong: {:?}", status.error_str());
        }),

        "move" => ctrl.move_to(id, value(4)),

        "raw" => ctrl.set_position_raw(id, value(4)),

        "release" => ctrl.release(&[id]).map(|count| {
            info!(count, "released");
        }),

        "limits" => ctrl.set_position_limits(id, value(4), value(5)),

        "read" => ctrl.read_position(id).map(|position| {
            info!(%port, position, "present position");
        }),

        other => {
            eprintln!("unknown command {:?}\n{}", other, USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = res {
        error!(%port, "{}: {}", args[2], e);
        process::exit(1);
    }

    info!("all things done");
}
