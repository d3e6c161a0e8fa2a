use std::io::{Error, ErrorKind, Read, Result, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use net2::TcpBuilder;
use tracing::trace;

/// Byte pipe to a servo bus.
pub trait Transport: Send {
    /// Writes the whole buffer to the bus.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Returns whatever bytes have arrived so far, without waiting for more.
    fn recv_available(&mut self) -> Result<Vec<u8>>;

    /// Drops anything left in the receive buffer.
    fn discard_input(&mut self) -> Result<()> {
        self.recv_available().map(|_| ())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn recv_available(&mut self) -> Result<Vec<u8>> {
        (**self).recv_available()
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

/// A serial bus exposed over TCP by a network serial bridge.
pub struct Tcp {
    inner: Option<TcpStream>,
}

impl Tcp {
    pub fn connect(bind: Option<SocketAddr>, dest: SocketAddr) -> Result<Self> {
        let builder = if dest.is_ipv4() {
            TcpBuilder::new_v4()
        } else {
            TcpBuilder::new_v6()
        }?;

        if let Some(bind) = bind {
            builder.bind(bind)?;
        }

        let stream = builder.connect(dest)?;
        stream.set_nodelay(true)?;
        Ok(Tcp {
            inner: Some(stream),
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "socket dropped"))
    }

    pub fn try_clone(&self) -> Result<Self> {
        match self.inner.as_ref() {
            Some(inner) => inner.try_clone().map(|stream| Tcp {
                inner: Some(stream),
            }),
            None => Err(Error::new(ErrorKind::NotConnected, "socket dropped")),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(inner) = self.inner.take() {
            let _ = inner.shutdown(Shutdown::Both);
        }
    }
}

impl Transport for Tcp {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream()?;
        stream.write_all(data)?;
        stream.flush()
    }

    fn recv_available(&mut self) -> Result<Vec<u8>> {
        let stream = self.stream()?;
        stream.set_nonblocking(true)?;

        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        let res = loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    break Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "serial bridge closed the connection",
                    ))
                }
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };

        stream.set_nonblocking(false)?;
        res?;

        trace!(len = out.len(), "tcp bytes available");
        Ok(out)
    }
}

impl Drop for Tcp {
    fn drop(&mut self) {
        self.shutdown();
    }
}
