use std::io::{Cursor, Write};

use crate::{ensure_buf_size, util::macros::impl_num_enums, Error, Result};

pub mod cmd;
mod id;
pub mod register;
pub mod reply;

pub use id::*;

/// Frame marker leading every packet on the bus.
pub const HEADER: [u8; 2] = [0xff, 0xff];

/// header, id, length
const FRAME_PREFIX_SIZE: usize = 4;
/// header, id, length, instruction, checksum
pub const MIN_FRAME_SIZE: usize = FRAME_PREFIX_SIZE + 2;

impl_num_enums!(
    /// Instruction codes understood by the servos.
    Instruction,
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    Recover = 0x06,
    Reset = 0x0a,
    SyncWrite = 0x83,
);

/// Payload encoding of a command.
pub trait Serialize {
    const SIZE_HINT: usize;

    fn ser(&self, w: &mut impl Write) -> Result<()>;

    #[inline]
    fn size(&self) -> usize {
        Self::SIZE_HINT
    }
}

pub trait Deserialize: Sized {
    fn de(buf: &[u8]) -> Result<Self>;
}

/// A request addressed to a servo.
///
/// Commands without a register are framed as `[FF FF id len instruction checksum]`,
/// commands with one as `[FF FF id len instruction register payload.. checksum]`.
pub trait Command: Serialize {
    const INSTRUCTION: Instruction;

    fn id(&self) -> ServoId;

    fn register(&self) -> Option<u8>;
}

/// Sum of the given bytes with single byte wraparound, complemented.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// An encoded frame, ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(Vec<u8>);

impl Packet {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn id(&self) -> ServoId {
        ServoId(self.0[2])
    }

    #[inline]
    pub fn checksum(&self) -> u8 {
        self.0[self.0.len() - 1]
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Packet> for Vec<u8> {
    fn from(p: Packet) -> Self {
        p.0
    }
}

/// Builds the frame for `cmd`.
pub fn pack_cmd<C: Command>(cmd: &C) -> Result<Packet> {
    let register = cmd.register();
    let size = cmd.size();

    // instruction + checksum, + register and payload for register commands
    let msg_len = match register {
        Some(_) => 3 + size,
        None => {
            if size != 0 {
                return Err(Error::InvalidData(
                    "payload given for a command without register".into(),
                ));
            }

            2
        }
    };

    if msg_len > u8::MAX as usize {
        return Err(Error::InvalidData(
            format!("frame length {} does not fit in one byte", msg_len).into(),
        ));
    }

    let total = FRAME_PREFIX_SIZE + msg_len;
    let mut buf = vec![0u8; total];
    buf[..2].copy_from_slice(&HEADER);
    buf[2] = cmd.id().get();
    buf[3] = msg_len as u8;
    buf[4] = C::INSTRUCTION.code();

    if let Some(register) = register {
        buf[5] = register;
        let mut writer = Cursor::new(&mut buf[6..total - 1]);
        cmd.ser(&mut writer)?;
        if writer.position() as usize != size {
            return Err(Error::InvalidData(
                format!(
                    "payload of {:?} is {} bytes, expected {}",
                    C::INSTRUCTION,
                    writer.position(),
                    size
                )
                .into(),
            ));
        }
    }

    buf[total - 1] = checksum(&buf[2..total - 1]);
    Ok(Packet(buf))
}

/// A frame lifted off the wire.
///
/// For instruction frames `code` holds the instruction, for status frames the
/// servo's error bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Raw<'r> {
    pub id: ServoId,
    pub code: u8,
    pub params: &'r [u8],
}

/// Unpacks the frame at the beginning of `buf`, returning it and the number of bytes consumed.
pub fn unpack_raw(buf: &[u8]) -> Result<(Raw<'_>, usize)> {
    ensure_buf_size!(buf, MIN_FRAME_SIZE, "frame header");
    if buf[..2] != HEADER {
        return Err(Error::InvalidData("invalid frame marker".into()));
    }

    let msg_len = buf[3] as usize;
    if msg_len < 2 {
        return Err(Error::InvalidData(
            format!("frame length {} too short", msg_len).into(),
        ));
    }

    let size = FRAME_PREFIX_SIZE + msg_len;
    ensure_buf_size!(buf, size, "frame body");

    let expected = checksum(&buf[2..size - 1]);
    if buf[size - 1] != expected {
        return Err(Error::InvalidData(
            format!(
                "checksum mismatch, got 0x{:02x}, expected 0x{:02x}",
                buf[size - 1],
                expected
            )
            .into(),
        ));
    }

    Ok((
        Raw {
            id: ServoId(buf[2]),
            code: buf[4],
            params: &buf[5..size - 1],
        },
        size,
    ))
}

/// Skips bytes until the next frame marker, returning its offset.
pub fn find_header(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == HEADER)
}
