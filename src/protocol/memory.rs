/*!
In-process transport.

A connected pair of endpoints backed by channels, for running both roles
of a session inside one process.
*/

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::core::error::{Error, Result};

use super::transport::Transport;

struct Inbound {
    chunks: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

/// One end of an in-process duplex stream
#[derive(Clone)]
pub struct MemoryTransport {
    outbound: Sender<Vec<u8>>,
    wake: Sender<Vec<u8>>,
    inbound: Arc<Mutex<Inbound>>,
    closed: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));

        let a = Self {
            outbound: b_tx.clone(),
            wake: a_tx.clone(),
            inbound: Arc::new(Mutex::new(Inbound { chunks: a_rx, pending: Vec::new() })),
            closed: Arc::clone(&closed),
        };
        let b = Self {
            outbound: a_tx,
            wake: b_tx,
            inbound: Arc::new(Mutex::new(Inbound { chunks: b_rx, pending: Vec::new() })),
            closed,
        };
        (a, b)
    }

    /// Whether either end has shut the stream down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }
        if data.is_empty() {
            return Ok(());
        }
        self.outbound
            .send(data.to_vec())
            .map_err(|_| Error::TransportClosed)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        let mut inbound = self.inbound.lock().map_err(|_| Error::TransportClosed)?;

        while inbound.pending.is_empty() {
            // Data queued before a shutdown is still delivered.
            let chunk = if self.is_closed() {
                match inbound.chunks.try_recv() {
                    Ok(chunk) if !chunk.is_empty() => chunk,
                    _ => return Err(Error::TransportClosed),
                }
            } else {
                match inbound.chunks.recv_timeout(timeout) {
                    Ok(chunk) => chunk,
                    Err(RecvTimeoutError::Timeout) => return Ok(None),
                    Err(RecvTimeoutError::Disconnected) => return Err(Error::TransportClosed),
                }
            };
            // Empty chunks are wake-ups sent by shutdown.
            inbound.pending = chunk;
        }

        let n = buf.len().min(inbound.pending.len());
        buf[..n].copy_from_slice(&inbound.pending[..n]);
        inbound.pending.drain(..n);
        Ok(Some(n))
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Either side may already be gone.
        let _ = self.outbound.send(Vec::new());
        let _ = self.wake.send(Vec::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_duplex() -> Result<()> {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send(b"ping")?;
        b.send(b"pong")?;

        let mut buf = [0u8; 4];
        b.receive_exact(&mut buf, Duration::from_secs(1), "ping")?;
        assert_eq!(&buf, b"ping");
        a.receive_exact(&mut buf, Duration::from_secs(1), "pong")?;
        assert_eq!(&buf, b"pong");
        Ok(())
    }

    #[test]
    fn test_partial_reads() -> Result<()> {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send(b"abcdef")?;

        let mut buf = [0u8; 4];
        assert_eq!(b.receive(&mut buf, Duration::from_secs(1))?, Some(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(b.receive(&mut buf, Duration::from_secs(1))?, Some(2));
        assert_eq!(&buf[..2], b"ef");
        Ok(())
    }

    #[test]
    fn test_timeout_and_shutdown() -> Result<()> {
        let (a, mut b) = MemoryTransport::pair();
        let mut buf = [0u8; 4];
        assert_eq!(b.receive(&mut buf, Duration::from_millis(10))?, None);

        a.shutdown()?;
        match b.receive(&mut buf, Duration::from_secs(1)) {
            Err(Error::TransportClosed) => {}
            other => panic!("expected TransportClosed, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_queued_data_survives_shutdown() -> Result<()> {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send(b"last")?;
        a.shutdown()?;

        let mut buf = [0u8; 4];
        assert_eq!(b.receive(&mut buf, Duration::from_secs(1))?, Some(4));
        assert_eq!(&buf, b"last");
        assert!(matches!(
            b.receive(&mut buf, Duration::from_secs(1)),
            Err(Error::TransportClosed)
        ));
        Ok(())
    }

    #[test]
    fn test_send_after_shutdown() -> Result<()> {
        let (mut a, b) = MemoryTransport::pair();
        b.shutdown()?;
        assert!(a.is_closed());
        assert!(matches!(a.send(b"x"), Err(Error::TransportClosed)));
        Ok(())
    }
}
