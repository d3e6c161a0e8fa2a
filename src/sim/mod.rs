//! A virtual servo bus.
//!
//! Each servo keeps its own control table. Writes land in the table straight
//! away and a new goal position is reached instantly. Only `Ping` and `Read`
//! are answered, the way servos behave with a return level of 1.

use std::collections::BTreeMap;
use std::io;

use tracing::{debug, trace, warn};

use crate::{
    conn::{mem::MemPort, Transport},
    proto::{checksum, find_header, register, unpack_raw, Instruction, Raw, ServoId, HEADER},
    Error, Result,
};

const DEFAULT_POSITION: u16 = 512;

#[derive(Debug, Clone)]
pub struct VirtualServo {
    table: [u8; register::TABLE_SIZE],
    staged: Option<(u8, Vec<u8>)>,
    status: u8,
}

impl VirtualServo {
    fn new(id: ServoId) -> Self {
        let mut table = [0u8; register::TABLE_SIZE];
        table[register::ID as usize] = id.get();
        table[register::MAX_ANGLE_LIMIT_L as usize..=register::MAX_ANGLE_LIMIT_H as usize]
            .copy_from_slice(&1023u16.to_be_bytes());
        table[register::PRESENT_POSITION_LOW as usize..=register::PRESENT_POSITION_HIGH as usize]
            .copy_from_slice(&DEFAULT_POSITION.to_be_bytes());

        VirtualServo {
            table,
            staged: None,
            status: 0,
        }
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.table[addr as usize]
    }

    pub fn registers(&self, addr: u8, len: usize) -> Option<&[u8]> {
        self.table.get(addr as usize..addr as usize + len)
    }

    pub fn torque_enabled(&self) -> bool {
        self.register(register::TORQUE_ENABLE) != 0
    }

    pub fn present_position(&self) -> i16 {
        // position registers hold the value high byte first, like goal writes
        let first = self.register(register::PRESENT_POSITION_LOW);
        let second = self.register(register::PRESENT_POSITION_HIGH);
        i16::from_be_bytes([first, second])
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> bool {
        let start = addr as usize;
        let Some(dest) = self.table.get_mut(start..start + data.len()) else {
            return false;
        };
        dest.copy_from_slice(data);

        let goal = register::GOAL_POSITION_LOW as usize;
        if start <= goal + 1 && goal < start + data.len() {
            let present = register::PRESENT_POSITION_LOW as usize;
            self.table.copy_within(goal..goal + 2, present);
        }

        true
    }
}

#[derive(Debug, Default)]
pub struct VirtualBus {
    servos: BTreeMap<u8, VirtualServo>,
    echo: bool,
    pending: Vec<u8>,
    outgoing: Vec<u8>,
    received: Vec<Vec<u8>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Half duplex lines read back every byte they transmit.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn add_servo(&mut self, id: ServoId) -> &mut Self {
        self.servos.insert(id.get(), VirtualServo::new(id));
        self
    }

    pub fn servo(&self, id: ServoId) -> Option<&VirtualServo> {
        self.servos.get(&id.get())
    }

    /// Sets the error bits reported in every status frame of the servo.
    pub fn set_status(&mut self, id: ServoId, status: u8) {
        if let Some(servo) = self.servos.get_mut(&id.get()) {
            servo.status = status;
        }
    }

    pub fn set_present_position(&mut self, id: ServoId, raw: i16) {
        if let Some(servo) = self.servos.get_mut(&id.get()) {
            let at = register::PRESENT_POSITION_LOW as usize;
            servo.table[at..at + 2].copy_from_slice(&raw.to_be_bytes());
        }
    }

    /// Every complete frame received so far.
    pub fn received(&self) -> &[Vec<u8>] {
        &self.received
    }

    /// Feeds bytes from the line, returning the bytes the servos put back on it.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        self.pending.extend_from_slice(data);

        loop {
            let Some(offset) = find_header(&self.pending) else {
                // keep a trailing marker byte, the rest is noise
                let keep = usize::from(self.pending.last() == Some(&HEADER[0]));
                let noise = self.pending.len() - keep;
                self.pending.drain(..noise);
                break;
            };
            self.pending.drain(..offset);

            let frame = match unpack_raw(&self.pending) {
                Ok((_, size)) => self.pending[..size].to_vec(),
                Err(Error::NotEnoughData { .. }) => break,
                Err(e) => {
                    warn!("dropping corrupt frame byte: {}", e);
                    self.pending.drain(..1);
                    continue;
                }
            };
            self.pending.drain(..frame.len());

            if let Ok((raw, _)) = unpack_raw(&frame) {
                if let Some(reply) = self.dispatch(raw) {
                    out.extend_from_slice(&reply);
                }
            }

            self.received.push(frame);
        }

        out
    }

    fn targets(&mut self, id: ServoId) -> Vec<&mut VirtualServo> {
        if id.is_broadcast() {
            self.servos.values_mut().collect()
        } else {
            self.servos.get_mut(&id.get()).into_iter().collect()
        }
    }

    fn dispatch(&mut self, raw: Raw<'_>) -> Option<Vec<u8>> {
        let inst = match Instruction::try_from(raw.code) {
            Ok(inst) => inst,
            Err(e) => {
                warn!(id = raw.id.get(), "ignoring frame: {}", e);
                return None;
            }
        };

        trace!(id = raw.id.get(), ?inst, params = raw.params.len(), "frame");

        match inst {
            Instruction::Ping => self.reply(raw.id, |_| Some(Vec::new())),

            Instruction::Read => {
                let [addr, len] = *raw.params else {
                    warn!(id = raw.id.get(), "malformed read request");
                    return None;
                };

                self.reply(raw.id, |servo| {
                    servo.registers(addr, len as usize).map(<[u8]>::to_vec)
                })
            }

            Instruction::Write => {
                let (&addr, data) = raw.params.split_first()?;
                for servo in self.targets(raw.id) {
                    if !servo.write(addr, data) {
                        warn!(id = raw.id.get(), addr, len = data.len(), "write out of table");
                    }
                }
                None
            }

            Instruction::RegWrite => {
                let (&addr, data) = raw.params.split_first()?;
                for servo in self.targets(raw.id) {
                    servo.staged = Some((addr, data.to_vec()));
                }
                None
            }

            Instruction::Action => {
                for servo in self.targets(raw.id) {
                    if let Some((addr, data)) = servo.staged.take() {
                        servo.write(addr, &data);
                    }
                }
                None
            }

            Instruction::SyncWrite => {
                let [addr, data_len, ref blocks @ ..] = *raw.params else {
                    warn!("malformed sync write");
                    return None;
                };

                for block in blocks.chunks(1 + data_len as usize) {
                    let (&id, data) = block.split_first()?;
                    if data.len() != data_len as usize {
                        warn!(id, "truncated sync write block");
                        break;
                    }

                    if let Some(servo) = self.servos.get_mut(&id) {
                        servo.write(addr, data);
                    }
                }
                None
            }

            Instruction::Reset => {
                for servo in self.targets(raw.id) {
                    let id = ServoId(servo.register(register::ID));
                    *servo = VirtualServo::new(id);
                }
                None
            }

            Instruction::Recover => {
                for servo in self.targets(raw.id) {
                    servo.status = 0;
                }
                None
            }
        }
    }

    fn reply<F>(&self, id: ServoId, params: F) -> Option<Vec<u8>>
    where
        F: FnOnce(&VirtualServo) -> Option<Vec<u8>>,
    {
        if id.is_broadcast() {
            return None;
        }

        let servo = self.servos.get(&id.get())?;
        let params = params(servo)?;

        let mut frame = Vec::with_capacity(params.len() + 6);
        frame.extend_from_slice(&HEADER);
        frame.push(id.get());
        frame.push(params.len() as u8 + 2);
        frame.push(servo.status);
        frame.extend_from_slice(&params);
        frame.push(checksum(&frame[2..]));
        Some(frame)
    }

    /// Answers frames arriving on `port` until the peer goes away.
    pub fn serve(&mut self, port: &mut MemPort) -> Result<()> {
        debug!("virtual bus serving");
        while let Some(chunk) = port.recv() {
            let mut out = Vec::new();
            if self.echo {
                out.extend_from_slice(&chunk);
            }
            out.extend(self.process(&chunk));

            if port.is_peer_closed() {
                break;
            }
            port.send(&out)?;
        }

        debug!("virtual bus stopped");
        Ok(())
    }
}

impl Transport for VirtualBus {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        if self.echo {
            self.outgoing.extend_from_slice(data);
        }

        let reply = self.process(data);
        self.outgoing.extend(reply);
        Ok(())
    }

    fn recv_available(&mut self) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.outgoing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{
        cmd::{Action, MoveTo, Ping, ReadPosition, RegWrite, SetTorqueEnable, SyncWrite, Write},
        pack_cmd,
        reply::StatusPacket,
        Deserialize, BROADCAST_ID,
    };

    fn bus() -> VirtualBus {
        let mut bus = VirtualBus::new();
        bus.add_servo(ServoId(1)).add_servo(ServoId(2));
        bus
    }

    #[test]
    fn ping_answers_known_servos_only() {
        let mut bus = bus();
        let reply = bus.process(pack_cmd(&Ping::new(ServoId(1))).unwrap().as_bytes());
        assert_eq!(reply, vec![0xff, 0xff, 0x01, 0x02, 0x00, 0xfc]);

        assert!(bus
            .process(pack_cmd(&Ping::new(ServoId(7))).unwrap().as_bytes())
            .is_empty());
        assert!(bus
            .process(pack_cmd(&Ping::new(BROADCAST_ID)).unwrap().as_bytes())
            .is_empty());
    }

    #[test]
    fn move_then_read_back() {
        let mut bus = bus();
        bus.process(pack_cmd(&MoveTo::new(ServoId(2), 600)).unwrap().as_bytes());
        assert_eq!(bus.servo(ServoId(2)).unwrap().present_position(), 600);
        assert_eq!(bus.servo(ServoId(1)).unwrap().present_position(), 512);

        let reply = bus.process(pack_cmd(&ReadPosition::new(ServoId(2))).unwrap().as_bytes());
        let status = StatusPacket::de(&reply).unwrap();
        assert_eq!(status.params, vec![0x02, 0x58]);
    }

    #[test]
    fn split_and_noisy_input() {
        let mut bus = bus();
        let frame = pack_cmd(&SetTorqueEnable {
            id: ServoId(1),
            on: true,
        })
        .unwrap()
        .into_vec();

        let mut noisy = vec![0x00, 0x13];
        noisy.extend_from_slice(&frame[..3]);
        assert!(bus.process(&noisy).is_empty());
        assert!(!bus.servo(ServoId(1)).unwrap().torque_enabled());

        bus.process(&frame[3..]);
        assert!(bus.servo(ServoId(1)).unwrap().torque_enabled());
        assert_eq!(bus.received(), &[frame]);
    }

    #[test]
    fn reg_write_waits_for_action() {
        let mut bus = bus();
        let staged = RegWrite::new(BROADCAST_ID, register::TORQUE_ENABLE, vec![1]);
        bus.process(pack_cmd(&staged).unwrap().as_bytes());
        assert!(!bus.servo(ServoId(2)).unwrap().torque_enabled());

        bus.process(pack_cmd(&Action::new(BROADCAST_ID)).unwrap().as_bytes());
        assert!(bus.servo(ServoId(1)).unwrap().torque_enabled());
        assert!(bus.servo(ServoId(2)).unwrap().torque_enabled());
    }

    #[test]
    fn sync_write_updates_each_servo() {
        let mut bus = bus();
        let mut cmd = SyncWrite::new(register::TORQUE_ENABLE, 1);
        cmd.add(ServoId(1), vec![1]).unwrap();
        cmd.add(ServoId(2), vec![0]).unwrap();
        bus.process(pack_cmd(&cmd).unwrap().as_bytes());
        assert!(bus.servo(ServoId(1)).unwrap().torque_enabled());
        assert!(!bus.servo(ServoId(2)).unwrap().torque_enabled());
    }

    #[test]
    fn out_of_table_write_is_ignored() {
        let mut bus = bus();
        let cmd = Write::new(ServoId(1), 127, vec![1, 2]);
        bus.process(pack_cmd(&cmd).unwrap().as_bytes());
        assert_eq!(bus.servo(ServoId(1)).unwrap().register(127), 0);
    }

    #[test]
    fn echo_as_transport() {
        let mut bus = bus().with_echo(true);
        let ping = pack_cmd(&Ping::new(ServoId(2))).unwrap();
        bus.send(ping.as_bytes()).unwrap();

        let got = bus.recv_available().unwrap();
        assert!(got.starts_with(ping.as_bytes()));
        assert_eq!(got.len(), ping.len() + 6);
        assert!(bus.recv_available().unwrap().is_empty());
    }
}
