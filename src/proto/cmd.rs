use std::io::Write as IoWrite;

use byteorder::{WriteBytesExt, BE, LE};

use super::{register, Command, Instruction, Serialize, ServoId, BROADCAST_ID};
use crate::{util::scale::ScalarRange, Error, Result};

/// Goal positions are saturated into this range, never rejected.
pub const GOAL_POSITION_RANGE: ScalarRange = ScalarRange::new(0, 1023);

/// Goal speed sent along with every move.
pub const GOAL_SPEED: u16 = 1000;

macro_rules! impl_bare_cmd {
    ($(#[$meta:meta])* $name:ident, $inst:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub id: ServoId,
        }

        impl $name {
            #[inline]
            pub fn new(id: ServoId) -> Self {
                $name { id }
            }
        }

        impl Serialize for $name {
            const SIZE_HINT: usize = 0;

            fn ser(&self, _w: &mut impl IoWrite) -> Result<()> {
                Ok(())
            }
        }

        impl Command for $name {
            const INSTRUCTION: Instruction = $inst;

            fn id(&self) -> ServoId {
                self.id
            }

            fn register(&self) -> Option<u8> {
                None
            }
        }
    };
}

impl_bare_cmd!(Ping, Instruction::Ping);
impl_bare_cmd!(
    /// Applies everything staged with [`RegWrite`]; usually sent to [`BROADCAST_ID`].
    Action,
    Instruction::Action
);
impl_bare_cmd!(Recover, Instruction::Recover);
impl_bare_cmd!(
    /// Restores the servo's control table to factory defaults.
    Reset,
    Instruction::Reset
);

macro_rules! impl_register_write {
    ($(#[$meta:meta])* $name:ident, $inst:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub id: ServoId,
            pub register: u8,
            pub data: Vec<u8>,
        }

        impl $name {
            pub fn new(id: ServoId, register: u8, data: Vec<u8>) -> Self {
                $name { id, register, data }
            }
        }

        impl Serialize for $name {
            const SIZE_HINT: usize = 0;

            fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
                w.write_all(&self.data).map_err(From::from)
            }

            #[inline]
            fn size(&self) -> usize {
                self.data.len()
            }
        }

        impl Command for $name {
            const INSTRUCTION: Instruction = $inst;

            fn id(&self) -> ServoId {
                self.id
            }

            fn register(&self) -> Option<u8> {
                Some(self.register)
            }
        }
    };
}

impl_register_write!(
    /// Writes `data` starting at `register`.
    Write,
    Instruction::Write
);
impl_register_write!(
    /// Stages a write that takes effect on the next [`Action`].
    RegWrite,
    Instruction::RegWrite
);

/// Requests `len` bytes of the control table starting at `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Read {
    pub id: ServoId,
    pub register: u8,
    pub len: u8,
}

impl Serialize for Read {
    const SIZE_HINT: usize = 1;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        w.write_u8(self.len).map_err(From::from)
    }
}

impl Command for Read {
    const INSTRUCTION: Instruction = Instruction::Read;

    fn id(&self) -> ServoId {
        self.id
    }

    fn register(&self) -> Option<u8> {
        Some(self.register)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTorqueEnable {
    pub id: ServoId,
    pub on: bool,
}

impl Serialize for SetTorqueEnable {
    const SIZE_HINT: usize = 1;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        w.write_u8(self.on as u8).map_err(From::from)
    }
}

impl Command for SetTorqueEnable {
    const INSTRUCTION: Instruction = Instruction::Write;

    fn id(&self) -> ServoId {
        self.id
    }

    fn register(&self) -> Option<u8> {
        Some(register::TORQUE_ENABLE)
    }
}

/// Both bounds are saturated into [`GOAL_POSITION_RANGE`] and written low byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPositionLimits {
    pub id: ServoId,
    pub min: i32,
    pub max: i32,
}

impl Serialize for SetPositionLimits {
    const SIZE_HINT: usize = 4;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        w.write_i16::<LE>(GOAL_POSITION_RANGE.clamp(self.min) as i16)?;
        w.write_i16::<LE>(GOAL_POSITION_RANGE.clamp(self.max) as i16)?;
        Ok(())
    }
}

impl Command for SetPositionLimits {
    const INSTRUCTION: Instruction = Instruction::Write;

    fn id(&self) -> ServoId {
        self.id
    }

    fn register(&self) -> Option<u8> {
        Some(register::GOAL_POSITION_LOW)
    }
}

/// Moves to `position`, saturated into [`GOAL_POSITION_RANGE`].
///
/// The goal position is written high byte first, followed by a zero goal time
/// and [`GOAL_SPEED`], both big endian as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTo {
    pub id: ServoId,
    pub position: i32,
}

impl MoveTo {
    #[inline]
    pub fn new(id: ServoId, position: i32) -> Self {
        MoveTo { id, position }
    }
}

impl Serialize for MoveTo {
    const SIZE_HINT: usize = 6;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        w.write_u16::<BE>(GOAL_POSITION_RANGE.clamp(self.position) as u16)?;
        // goal time
        w.write_u16::<BE>(0)?;
        w.write_u16::<BE>(GOAL_SPEED)?;
        Ok(())
    }
}

impl Command for MoveTo {
    const INSTRUCTION: Instruction = Instruction::Write;

    fn id(&self) -> ServoId {
        self.id
    }

    fn register(&self) -> Option<u8> {
        Some(register::GOAL_POSITION_LOW)
    }
}

/// Reads the two byte present position register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPosition {
    pub id: ServoId,
}

impl ReadPosition {
    #[inline]
    pub fn new(id: ServoId) -> Self {
        ReadPosition { id }
    }
}

impl From<ReadPosition> for Read {
    fn from(r: ReadPosition) -> Self {
        Read {
            id: r.id,
            register: register::PRESENT_POSITION_LOW,
            len: 2,
        }
    }
}

impl Serialize for ReadPosition {
    const SIZE_HINT: usize = 1;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        Read::from(*self).ser(w)
    }
}

impl Command for ReadPosition {
    const INSTRUCTION: Instruction = Instruction::Read;

    fn id(&self) -> ServoId {
        self.id
    }

    fn register(&self) -> Option<u8> {
        Some(register::PRESENT_POSITION_LOW)
    }
}

/// Writes the same register block on several servos in one broadcast frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWrite {
    pub start: u8,
    pub data_len: u8,
    entries: Vec<(ServoId, Vec<u8>)>,
}

impl SyncWrite {
    pub fn new(start: u8, data_len: u8) -> Self {
        SyncWrite {
            start,
            data_len,
            entries: Vec::new(),
        }
    }

    /// Adds one servo's block; each id may only appear once and `data` must be `data_len` bytes.
    pub fn add(&mut self, id: ServoId, data: Vec<u8>) -> Result<()> {
        if data.len() != self.data_len as usize {
            return Err(Error::InvalidData(
                format!(
                    "sync write block for {} is {} bytes, expected {}",
                    id,
                    data.len(),
                    self.data_len
                )
                .into(),
            ));
        }

        if self.entries.iter().any(|(eid, _)| *eid == id) {
            return Err(Error::InvalidData(
                format!("{} already in sync write", id).into(),
            ));
        }

        self.entries.push((id, data));
        Ok(())
    }

    pub fn entries(&self) -> &[(ServoId, Vec<u8>)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SyncWrite {
    const SIZE_HINT: usize = 1;

    fn ser(&self, w: &mut impl IoWrite) -> Result<()> {
        w.write_u8(self.data_len)?;
        for (id, data) in &self.entries {
            w.write_u8(id.get())?;
            w.write_all(data)?;
        }

        Ok(())
    }

    fn size(&self) -> usize {
        Self::SIZE_HINT + self.entries.len() * (1 + self.data_len as usize)
    }
}

impl Command for SyncWrite {
    const INSTRUCTION: Instruction = Instruction::SyncWrite;

    fn id(&self) -> ServoId {
        BROADCAST_ID
    }

    fn register(&self) -> Option<u8> {
        Some(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{checksum, pack_cmd, unpack_raw};

    fn bytes<C: Command>(cmd: C) -> Vec<u8> {
        pack_cmd(&cmd).unwrap().into_vec()
    }

    #[test]
    fn ping_frames() {
        assert_eq!(
            bytes(Ping::new(ServoId(1))),
            vec![0xff, 0xff, 0x01, 0x02, 0x01, 0xfb]
        );

        for id in 0..=255u8 {
            let expected = !(id.wrapping_add(2).wrapping_add(1));
            assert_eq!(
                bytes(Ping::new(ServoId(id))),
                vec![0xff, 0xff, id, 0x02, 0x01, expected]
            );
        }
    }

    #[test]
    fn torque_enable_frame() {
        assert_eq!(
            bytes(SetTorqueEnable {
                id: ServoId(0),
                on: true
            }),
            vec![0xff, 0xff, 0x00, 0x04, 0x03, 0x28, 0x01, 0xcf]
        );

        let off = bytes(SetTorqueEnable {
            id: ServoId(3),
            on: false,
        });
        assert_eq!(off[5..7], [register::TORQUE_ENABLE, 0x00]);
    }

    #[test]
    fn move_to_is_high_byte_first() {
        let frame = bytes(MoveTo::new(ServoId(1), 600));
        assert_eq!(frame[..6], [0xff, 0xff, 0x01, 0x09, 0x03, 0x2a]);
        assert_eq!(frame[6..12], [0x02, 0x58, 0x00, 0x00, 0x03, 0xe8]);
        assert_eq!(frame[12], checksum(&frame[2..12]));
    }

    #[test]
    fn move_to_saturates() {
        let id = ServoId(4);
        assert_eq!(bytes(MoveTo::new(id, 5000)), bytes(MoveTo::new(id, 1023)));
        assert_eq!(bytes(MoveTo::new(id, -10)), bytes(MoveTo::new(id, 0)));
        assert_eq!(
            bytes(MoveTo::new(id, i32::MAX)),
            bytes(MoveTo::new(id, 1023))
        );
    }

    #[test]
    fn position_limits_are_low_byte_first_and_saturated() {
        let frame = bytes(SetPositionLimits {
            id: ServoId(2),
            min: 2000,
            max: -5,
        });
        assert_eq!(frame[3], 0x07);
        assert_eq!(frame[4], Instruction::Write.code());
        assert_eq!(frame[5], register::GOAL_POSITION_LOW);
        assert_eq!(frame[6..10], [0xff, 0x03, 0x00, 0x00]);

        let frame = bytes(SetPositionLimits {
            id: ServoId(2),
            min: 0x0102,
            max: 0x0304,
        });
        assert_eq!(frame[6..10], [0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn read_position_requests_present_position_pair() {
        let id = ServoId(5);
        let frame = bytes(ReadPosition::new(id));
        assert_eq!(
            frame[..7],
            [0xff, 0xff, 0x05, 0x04, 0x02, register::PRESENT_POSITION_LOW, 0x02]
        );
        assert_eq!(frame, bytes(Read::from(ReadPosition::new(id))));
    }

    #[test]
    fn bare_commands() {
        assert_eq!(
            bytes(Action::new(BROADCAST_ID)),
            vec![0xff, 0xff, 0xfe, 0x02, 0x05, !(0xfeu8.wrapping_add(7))]
        );
        assert_eq!(bytes(Reset::new(ServoId(1)))[4], 0x0a);
        assert_eq!(bytes(Recover::new(ServoId(1)))[4], 0x06);
    }

    #[test]
    fn reg_write_uses_register_shape() {
        let frame = bytes(RegWrite::new(ServoId(9), register::GOAL_POSITION_LOW, vec![1, 2]));
        assert_eq!(frame[..8], [0xff, 0xff, 0x09, 0x05, 0x04, 0x2a, 0x01, 0x02]);
    }

    #[test]
    fn sync_write_frame() {
        let mut cmd = SyncWrite::new(register::GOAL_POSITION_LOW, 2);
        cmd.add(ServoId(1), vec![0x01, 0xf4]).unwrap();
        cmd.add(ServoId(2), vec![0x03, 0x20]).unwrap();
        assert!(cmd.add(ServoId(1), vec![0, 0]).is_err());
        assert!(cmd.add(ServoId(3), vec![0]).is_err());

        let frame = bytes(cmd);
        assert_eq!(
            frame[..13],
            [0xff, 0xff, 0xfe, 0x0a, 0x83, 0x2a, 0x02, 0x01, 0x01, 0xf4, 0x02, 0x03, 0x20]
        );
        assert_eq!(frame.len(), 14);
    }

    #[test]
    fn emitted_checksums_verify() {
        let mut sync = SyncWrite::new(register::GOAL_POSITION_LOW, 4);
        sync.add(ServoId(0), vec![0xff, 0x03, 0x00, 0x00]).unwrap();
        sync.add(ServoId(254), vec![0x10, 0x20, 0x30, 0x40]).unwrap();

        let frames = vec![
            bytes(RegWrite::new(ServoId(99), register::GOAL_SPEED_LOW, vec![0x03, 0xe8])),
            bytes(ReadPosition::new(ServoId(63))),
            bytes(sync),
            bytes(Ping::new(ServoId(200))),
            bytes(SetTorqueEnable {
                id: ServoId(255),
                on: true,
            }),
            bytes(MoveTo::new(ServoId(17), 777)),
            bytes(SetPositionLimits {
                id: ServoId(128),
                min: 12,
                max: 1000,
            }),
            bytes(Write::new(ServoId(250), 0xff, vec![0xff; 32])),
        ];

        for frame in frames {
            let (raw, size) = unpack_raw(&frame).unwrap();
            assert_eq!(size, frame.len());
            assert_eq!(frame[size - 1], checksum(&frame[2..size - 1]));
            assert_eq!(raw.id.get(), frame[2]);
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let cmd = Write::new(ServoId(1), 0, vec![0; 253]);
        assert!(matches!(pack_cmd(&cmd), Err(Error::InvalidData(_))));

        let cmd = Write::new(ServoId(1), 0, vec![0; 252]);
        assert_eq!(pack_cmd(&cmd).unwrap().as_bytes()[3], 0xff);
    }
}
