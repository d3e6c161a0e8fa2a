use std::io::{ErrorKind, Read, Result, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use super::Transport;

/// Line speed SCS servos ship with.
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

const READ_TIMEOUT: Duration = Duration::from_millis(2);

/// A servo bus on a local serial port, e.g. a USB to TTL adapter.
pub struct Serial {
    port: Box<dyn SerialPort>,
}

impl Serial {
    pub fn open(path: &str, baud_rate: Option<u32>) -> Result<Self> {
        let baud_rate = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;

        debug!(path, baud_rate, "serial port opened");
        Ok(Self::from_port(port))
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Serial { port }
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    pub fn baud_rate(&self) -> Result<u32> {
        self.port.baud_rate().map_err(From::from)
    }
}

impl Transport for Serial {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn recv_available(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let available = self.port.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }

            let start = out.len();
            out.resize(start + available, 0);
            match self.port.read(&mut out[start..]) {
                Ok(0) => {
                    out.truncate(start);
                    break;
                }
                Ok(n) => out.truncate(start + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => out.truncate(start),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    out.truncate(start);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        trace!(len = out.len(), "serial bytes available");
        Ok(out)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(From::from)
    }
}
