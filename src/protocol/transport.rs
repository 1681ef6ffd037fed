/*!
Byte transports the handshake and the chat session run over.

The protocol only needs three things from a transport: send a whole buffer,
receive whatever arrives within a wait bound, and report that the peer went
away. Fixed-size handshake records are read with
[`Transport::receive_exact`], built on top of [`Transport::receive`].
*/

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::core::error::{Error, Result};

/// Smallest read timeout handed to the OS; zero means "block forever" there
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Accept poll tick while waiting for a peer
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// A duplex byte stream
pub trait Transport: Send {
    /// Send all of `data`
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// [`Error::TransportClosed`] when the peer is gone.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;

    /// A second handle on the same stream
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Close both directions, waking any blocked receive
    fn shutdown(&self) -> Result<()>;

    /// Fill `buf` completely within `timeout`.
    ///
    /// Fails with [`Error::HandshakeTimeout`] naming `stage` when the bound
    /// runs out first.
    fn receive_exact(&mut self, buf: &mut [u8], timeout: Duration, stage: &'static str) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::HandshakeTimeout {
                    stage,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            if let Some(n) = self.receive(&mut buf[filled..], remaining)? {
                filled += n;
            }
        }
        Ok(())
    }
}

/// Transport over a TCP stream
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Connect to `addr`, trying each resolved address within `timeout`
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let mut last_err = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => {
                    info!(peer = %socket_addr, "Connected");
                    return Self::new(stream);
                }
                Err(err) => {
                    debug!(peer = %socket_addr, error = %err, "Connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if err.kind() == io::ErrorKind::TimedOut => Err(Error::HandshakeTimeout {
                stage: "connection",
                timeout_ms: timeout.as_millis() as u64,
            }),
            Some(err) => Err(Error::Io(err)),
            None => Err(Error::Config(format!("address {} did not resolve", addr))),
        }
    }

    /// Wait at most `timeout` for one peer on `listener`
    pub fn accept(listener: &TcpListener, timeout: Duration) -> Result<Self> {
        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + timeout;
        let accepted = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        listener.set_nonblocking(false)?;
                        return Err(Error::HandshakeTimeout {
                            stage: "incoming connection",
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    listener.set_nonblocking(false)?;
                    return Err(Error::Io(err));
                }
            }
        };
        listener.set_nonblocking(false)?;

        let (stream, peer) = accepted;
        stream.set_nonblocking(false)?;
        info!(peer = %peer, "Accepted connection");
        Self::new(stream)
    }

    /// Address of the remote end
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        match self.stream.write_all(data) {
            Ok(()) => Ok(()),
            Err(err) if is_disconnect(&err) => Err(Error::TransportClosed),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        self.stream.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        match self.stream.read(buf) {
            Ok(0) => Err(Error::TransportClosed),
            Ok(n) => Ok(Some(n)),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) if is_disconnect(&err) => Err(Error::TransportClosed),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
        })
    }

    fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}
