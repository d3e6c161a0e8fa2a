use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Highest virtual port index, `V99`.
pub const MAX_VIRTUAL_PORT: u8 = 99;

/// Id every servo on the bus listens to. Servos never answer broadcast frames.
pub const BROADCAST_ID: ServoId = ServoId(0xfe);

/// Address of a servo on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServoId(pub u8);

impl ServoId {
    #[inline]
    pub const fn new(id: u8) -> Self {
        ServoId(id)
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_broadcast(self) -> bool {
        self == BROADCAST_ID
    }
}

impl From<u8> for ServoId {
    fn from(id: u8) -> Self {
        ServoId(id)
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A host-side virtual servo port, `V0` through `V99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPort(u8);

impl VirtualPort {
    pub fn new(index: u8) -> Result<Self> {
        if index > MAX_VIRTUAL_PORT {
            return Err(Error::InvalidData(
                format!("virtual port V{} out of range", index).into(),
            ));
        }

        Ok(VirtualPort(index))
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }
}

impl From<VirtualPort> for ServoId {
    /// The servo id is the port's offset from `V0`.
    fn from(port: VirtualPort) -> Self {
        ServoId(port.0)
    }
}

impl FromStr for VirtualPort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix('V')
            .or_else(|| s.strip_prefix('v'))
            .ok_or_else(|| Error::InvalidData(format!("not a virtual port: {:?}", s).into()))?;

        let index: u8 = digits
            .parse()
            .map_err(|_| Error::InvalidData(format!("not a virtual port: {:?}", s).into()))?;

        VirtualPort::new(index)
    }
}

impl fmt::Display for VirtualPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}
