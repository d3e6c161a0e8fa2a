//! An in-process transport pair, each end receiving what the other sends.

use std::io::{Error, ErrorKind, Result};
use std::time::Duration;

use crate::util::chan::{unbounded, Rx, Tx};

pub struct MemPort {
    tx: Tx<Vec<u8>>,
    rx: Rx<Vec<u8>>,
}

pub fn pair() -> (MemPort, MemPort) {
    let (a_tx, a_rx) = unbounded();
    let (b_tx, b_rx) = unbounded();
    (MemPort { tx: a_tx, rx: b_rx }, MemPort { tx: b_tx, rx: a_rx })
}

fn broken(e: crate::Error) -> Error {
    Error::new(ErrorKind::BrokenPipe, e.to_string())
}

impl MemPort {
    /// Blocks until the peer sends something, `None` once the peer is gone.
    pub fn recv(&self) -> Option<Vec<u8>> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        self.rx.recv_timeout(timeout).map_err(broken)
    }

    pub fn is_peer_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl super::Transport for MemPort {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.tx.is_closed() {
            return Err(Error::new(ErrorKind::BrokenPipe, "peer dropped"));
        }

        if data.is_empty() {
            return Ok(());
        }

        self.tx.send(data.to_vec()).map_err(broken)
    }

    fn recv_available(&mut self) -> Result<Vec<u8>> {
        let chunks = self.rx.drain().map_err(broken)?;
        Ok(chunks.concat())
    }
}
