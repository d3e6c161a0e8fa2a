use std::fmt;
use std::io::Cursor;

use byteorder::{ReadBytesExt, BE, LE};

use super::{find_header, unpack_raw, Deserialize, Packet, ServoId};
use crate::{ensure_buf_size, Error, Result};

/// Size of the position replies collected by the fixed offset and reversed layouts.
pub const LEGACY_REPLY_SIZE: usize = 14;

/// Size of a status frame carrying a two byte register value.
pub const POSITION_STATUS_SIZE: usize = 8;

const FIXED_POSITION_OFFSET: usize = 11;

pub const ERRBIT_VOLTAGE: u8 = 1;
pub const ERRBIT_ANGLE: u8 = 2;
pub const ERRBIT_OVERHEAT: u8 = 4;
pub const ERRBIT_OVERELE: u8 = 8;
pub const ERRBIT_OVERLOAD: u8 = 32;

/// Where the present position sits in the bytes collected after a read request.
///
/// The two legacy layouts come from different transports and disagree on byte
/// order. Both are kept as observed on hardware. Anything other than exactly
/// 14 bytes means the servo did not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLayout {
    /// 14 bytes, little endian `i16` at offset 11. Used by a local serial port.
    FixedOffset,
    /// 14 bytes, little endian `i16` at the front of the reversed buffer.
    Reversed,
    /// A status frame answering the read request, optionally preceded by the
    /// request's own echo on a half duplex line. Has to be asked for.
    Status,
}

impl Default for ReplyLayout {
    fn default() -> Self {
        Self::FixedOffset
    }
}

impl fmt::Display for ReplyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplyLayout::FixedOffset => "fixed-offset",
            ReplyLayout::Reversed => "reversed",
            ReplyLayout::Status => "status",
        })
    }
}

/// A servo's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: ServoId,
    pub error: u8,
    pub params: Vec<u8>,
}

impl StatusPacket {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error == 0
    }

    pub fn error_str(&self) -> Option<&'static str> {
        error_str(self.error)
    }

    /// Fails with [`Error::ServoStatus`] when any error bit is set.
    pub fn ensure_ok(self) -> Result<Self> {
        if self.is_ok() {
            return Ok(self);
        }

        Err(Error::ServoStatus {
            id: self.id.get(),
            status: self.error,
        })
    }
}

impl Deserialize for StatusPacket {
    fn de(buf: &[u8]) -> Result<Self> {
        let (raw, _) = unpack_raw(buf)?;
        Ok(StatusPacket {
            id: raw.id,
            error: raw.code,
            params: raw.params.to_vec(),
        })
    }
}

/// Describes the most severe error bit in a status byte.
pub fn error_str(error: u8) -> Option<&'static str> {
    if error & ERRBIT_VOLTAGE != 0 {
        return Some("input voltage error");
    }

    if error & ERRBIT_ANGLE != 0 {
        return Some("angle sensor error");
    }

    if error & ERRBIT_OVERHEAT != 0 {
        return Some("overheat");
    }

    if error & ERRBIT_OVERELE != 0 {
        return Some("overcurrent");
    }

    if error & ERRBIT_OVERLOAD != 0 {
        return Some("overload");
    }

    None
}

/// Raw present position, as reported by the servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentPosition(pub i16);

impl Deserialize for PresentPosition {
    /// Status frames carry the register pair high byte first.
    fn de(buf: &[u8]) -> Result<Self> {
        ensure_buf_size!(buf, 2, "present position");
        let mut reader = Cursor::new(buf);
        Ok(PresentPosition(reader.read_i16::<BE>()?))
    }
}

/// Extracts the raw present position from the bytes collected after sending `request`.
pub fn decode_position(layout: ReplyLayout, buf: &[u8], request: &Packet) -> Result<PresentPosition> {
    match layout {
        ReplyLayout::FixedOffset => {
            ensure_legacy_size(buf)?;
            let mut reader = Cursor::new(&buf[FIXED_POSITION_OFFSET..]);
            Ok(PresentPosition(reader.read_i16::<LE>()?))
        }

        ReplyLayout::Reversed => {
            ensure_legacy_size(buf)?;
            let reversed: Vec<u8> = buf.iter().rev().copied().collect();
            let mut reader = Cursor::new(reversed);
            Ok(PresentPosition(reader.read_i16::<LE>()?))
        }

        ReplyLayout::Status => {
            let status = find_status(buf, request)?.ensure_ok()?;
            if status.params.len() != 2 {
                return Err(Error::InvalidData(
                    format!(
                        "position status from {} carries {} bytes",
                        status.id,
                        status.params.len()
                    )
                    .into(),
                ));
            }

            PresentPosition::de(&status.params)
        }
    }
}

fn ensure_legacy_size(buf: &[u8]) -> Result<()> {
    if buf.len() != LEGACY_REPLY_SIZE {
        return Err(Error::MalformedReply {
            want: LEGACY_REPLY_SIZE,
            got: buf.len(),
        });
    }

    Ok(())
}

/// Finds the status frame sent back by the servo `request` was addressed to.
pub fn find_status(buf: &[u8], request: &Packet) -> Result<StatusPacket> {
    // on a half duplex line the request reads back first, possibly behind late echoes
    let req = request.as_bytes();
    let mut rest = match buf.windows(req.len()).position(|w| w == req) {
        Some(at) => &buf[at + req.len()..],
        None => buf,
    };

    if rest.is_empty() {
        return Err(Error::MalformedReply {
            want: POSITION_STATUS_SIZE,
            got: 0,
        });
    }

    while let Some(offset) = find_header(rest) {
        rest = &rest[offset..];
        match unpack_raw(rest) {
            Ok((raw, size)) => {
                if raw.id == request.id() {
                    return Ok(StatusPacket {
                        id: raw.id,
                        error: raw.code,
                        params: raw.params.to_vec(),
                    });
                }

                rest = &rest[size..];
            }

            Err(Error::NotEnoughData { .. }) => break,
            // not a frame after all, resync on the next marker
            Err(_) => rest = &rest[1..],
        }
    }

    Err(Error::MalformedReply {
        want: POSITION_STATUS_SIZE,
        got: buf.len(),
    })
}
