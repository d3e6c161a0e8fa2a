use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::{Error, Result};

pub fn unbounded<T>() -> (Tx<T>, Rx<T>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let arc = Arc::new(rx);
    (
        Tx {
            tx,
            rx: arc.clone(),
        },
        Rx { rx: arc },
    )
}

pub struct Tx<T> {
    tx: Sender<T>,
    rx: Arc<Receiver<T>>,
}

impl<T> Tx<T> {
    pub fn send(&self, ele: T) -> Result<()> {
        self.tx
            .send(ele)
            .map_err(|_e| Error::Other("chan broken".into()))
    }

    pub fn is_closed(&self) -> bool {
        Arc::strong_count(&self.rx) == 1
    }
}

pub struct Rx<T> {
    rx: Arc<Receiver<T>>,
}

impl<T> Rx<T> {
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(ele) => Ok(Some(ele)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Other("chan broken".into())),
        }
    }

    /// Drains everything currently queued without blocking.
    pub fn drain(&self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(ele) => out.push(ele),
                Err(TryRecvError::Empty) => return Ok(out),
                Err(TryRecvError::Disconnected) => {
                    if out.is_empty() {
                        return Err(Error::Other("chan broken".into()));
                    }

                    return Ok(out);
                }
            }
        }
    }
}
