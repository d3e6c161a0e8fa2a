use std::borrow::Cow;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    NotEnoughData {
        want: usize,
        got: usize,
        msg: Option<Cow<'static, str>>,
    },
    InvalidData(Cow<'static, str>),
    /// The reply buffer did not have the expected size, usually because the servo did not respond.
    MalformedReply {
        want: usize,
        got: usize,
    },
    Unsupported(Cow<'static, str>),
    ServoStatus {
        id: u8,
        status: u8,
    },
    NotConfigured(u8),
    Other(Cow<'static, str>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IO(e) => write!(f, "io: {}", e),
            Error::NotEnoughData { want, got, msg } => {
                write!(f, "not enough data, want {} bytes, got {}", want, got)?;
                if let Some(msg) = msg {
                    write!(f, " ({})", msg)?;
                }
                Ok(())
            }
            Error::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Error::MalformedReply { want, got } => write!(
                f,
                "servo did not respond: want {} reply bytes, got {}",
                want, got
            ),
            Error::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Error::ServoStatus { id, status } => {
                write!(f, "servo {} reported status 0x{:02x}", id, status)
            }
            Error::NotConfigured(id) => write!(f, "no matching servo configured for id {}", id),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IO(e)
    }
}

macro_rules! ensure_buf_size {
    ($buf:expr, $size:expr) => {
        if $buf.len() < $size {
            return Err($crate::Error::NotEnoughData {
                want: $size,
                got: $buf.len(),
                msg: None,
            });
        }
    };

    ($buf:expr, $size:expr, $msg:expr) => {
        if $buf.len() < $size {
            return Err($crate::Error::NotEnoughData {
                want: $size,
                got: $buf.len(),
                msg: Some($msg.into()),
            });
        }
    };
}

pub(crate) use ensure_buf_size;
