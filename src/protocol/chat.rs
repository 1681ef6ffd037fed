/*!
Running chat session.

A session owns two halves of one transport. The caller's thread writes
through [`ChatSession::send`]; an inbound worker thread polls the other half,
decrypts each record and reports it as a [`ChatEvent`]. The worker checks a
shutdown channel on every poll tick, so [`ChatSession::close`] can stop it by
signalling, shutting the transport down and joining the thread.
*/

use std::{
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::core::{
    config::ChatConfig,
    crypto::SymmetricKey,
    error::{Error, Result},
    session::{Incoming, SecureChannel},
};

use super::transport::Transport;

/// Something that happened on the inbound side
#[derive(Debug)]
pub enum ChatEvent {
    /// Decrypted message from the peer
    Message(Vec<u8>),
    /// The peer sent the exit command
    PeerExited,
    /// The peer closed the transport
    Disconnected,
    /// A record could not be handled; fatal errors end the worker
    Error(Error),
}

/// An established, running chat session
pub struct ChatSession<T: Transport + 'static> {
    transport: T,
    channel: Arc<SecureChannel>,
    events: Receiver<ChatEvent>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> ChatSession<T> {
    /// Start the inbound worker for an established channel
    pub fn start(transport: T, channel: SecureChannel, config: &ChatConfig) -> Result<Self> {
        let channel = Arc::new(channel);
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = InboundWorker {
            transport: transport.try_clone()?,
            channel: Arc::clone(&channel),
            shutdown: shutdown_rx,
            events: event_tx,
            poll_interval: config.poll_interval,
            max_message_size: config.max_message_size,
        };
        let handle = thread::Builder::new()
            .name("chat-inbound".into())
            .spawn(move || worker.run())?;

        debug!("Chat session started");
        Ok(Self {
            transport,
            channel,
            events: event_rx,
            shutdown: Some(shutdown_tx),
            worker: Some(handle),
        })
    }

    /// Start a session from a key both sides already hold, skipping the handshake
    pub fn preshared(transport: T, key: SymmetricKey, config: &ChatConfig) -> Result<Self> {
        info!("Using pre-shared session key");
        Self::start(transport, SecureChannel::new(key, config), config)
    }

    /// The channel records are sealed and opened with
    pub fn channel(&self) -> &SecureChannel {
        &self.channel
    }

    /// Inbound events, in arrival order
    pub fn events(&self) -> &Receiver<ChatEvent> {
        &self.events
    }

    /// Wait at most `timeout` for the next inbound event
    pub fn next_event(&self, timeout: Duration) -> Option<ChatEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Whether the inbound worker is still running
    pub fn is_open(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Encrypt and send one message.
    ///
    /// Sending the exit command closes the local session afterwards.
    pub fn send(&mut self, plaintext: &[u8]) -> Result<()> {
        if self.shutdown.is_none() {
            return Err(Error::TransportClosed);
        }
        let record = self.channel.seal(plaintext)?;
        self.transport.send(&record)?;

        if self.channel.is_exit_command(plaintext) {
            info!("Exit command sent, closing session");
            self.close();
        }
        Ok(())
    }

    /// Stop the worker and release the transport
    pub fn close(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        // The worker may already have stopped on its own.
        let _ = shutdown.send(());
        if let Err(err) = self.transport.shutdown() {
            warn!(error = %err, "Transport shutdown failed");
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Inbound worker panicked");
            }
        }
        debug!("Chat session closed");
    }
}

impl<T: Transport + 'static> Drop for ChatSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

struct InboundWorker<T: Transport> {
    transport: T,
    channel: Arc<SecureChannel>,
    shutdown: Receiver<()>,
    events: Sender<ChatEvent>,
    poll_interval: Duration,
    max_message_size: usize,
}

impl<T: Transport> InboundWorker<T> {
    fn stop_requested(&self) -> bool {
        !matches!(self.shutdown.try_recv(), Err(TryRecvError::Empty))
    }

    fn emit(&self, event: ChatEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn run(mut self) {
        let mut buf = vec![0u8; self.max_message_size];
        while !self.stop_requested() {
            let received = self.transport.receive(&mut buf, self.poll_interval);
            let keep_going = match received {
                Ok(None) => true,
                Ok(Some(n)) => match self.channel.open(&buf[..n]) {
                    Ok(Incoming::Message(message)) => self.emit(ChatEvent::Message(message)),
                    Ok(Incoming::EndOfSession) => {
                        info!("Peer ended the session");
                        self.emit(ChatEvent::PeerExited);
                        false
                    }
                    Err(err) => {
                        warn!(len = n, error = %err, "Dropping undecryptable record");
                        self.emit(ChatEvent::Error(err))
                    }
                },
                Err(Error::TransportClosed) => {
                    if !self.stop_requested() {
                        info!("Peer disconnected");
                        self.emit(ChatEvent::Disconnected);
                    }
                    false
                }
                Err(err) => {
                    error!(error = %err, "Inbound transport failed");
                    self.emit(ChatEvent::Error(err));
                    false
                }
            };
            if !keep_going {
                break;
            }
        }
        debug!("Inbound worker stopped");
    }
}

/// Longest prefix of `line` that fits in one record of `max_message_size`
/// bytes without splitting a character
pub fn fit_to_record(line: &str, max_message_size: usize) -> &str {
    let limit = max_message_size.saturating_sub(1);
    if line.len() <= limit {
        return line;
    }
    let mut end = limit;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::memory::MemoryTransport;

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> ChatConfig {
        ChatConfig::default().with_poll_interval(Duration::from_millis(20))
    }

    fn sessions() -> Result<(ChatSession<MemoryTransport>, ChatSession<MemoryTransport>)> {
        let (a, b) = MemoryTransport::pair();
        let key = SymmetricKey::new(*b"Luhaozhe");
        let config = config();
        Ok((
            ChatSession::preshared(a, key.clone(), &config)?,
            ChatSession::preshared(b, key, &config)?,
        ))
    }

    #[test]
    fn test_message_delivery() -> Result<()> {
        let (mut alice, bob) = sessions()?;
        alice.send(b"hello")?;
        match bob.next_event(WAIT) {
            Some(ChatEvent::Message(message)) => assert_eq!(message, b"hello"),
            other => panic!("expected message, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_exit_command_ends_both_sides() -> Result<()> {
        let (mut alice, bob) = sessions()?;
        alice.send(b"quit")?;
        assert!(!alice.is_open());
        assert!(matches!(alice.send(b"late"), Err(Error::TransportClosed)));

        match bob.next_event(WAIT) {
            Some(ChatEvent::PeerExited) => {}
            other => panic!("expected PeerExited, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_peer_close_reports_disconnect() -> Result<()> {
        let (mut alice, bob) = sessions()?;
        alice.close();
        match bob.next_event(WAIT) {
            Some(ChatEvent::Disconnected) => {}
            other => panic!("expected Disconnected, got {:?}", other),
        }
        // The side that closed first reports nothing.
        assert!(alice.next_event(Duration::from_millis(50)).is_none());
        Ok(())
    }

    #[test]
    fn test_garbage_record_is_not_fatal() -> Result<()> {
        let (mut raw, peer) = MemoryTransport::pair();
        let session = ChatSession::preshared(peer, SymmetricKey::new(*b"Luhaozhe"), &config())?;

        raw.send(&[1, 2, 3, 4, 5])?;
        match session.next_event(WAIT) {
            Some(ChatEvent::Error(Error::MalformedCiphertext(_))) => {}
            other => panic!("expected malformed record, got {:?}", other),
        }

        let sealed = SecureChannel::with_key(SymmetricKey::new(*b"Luhaozhe")).seal(b"still here")?;
        raw.send(&sealed)?;
        match session.next_event(WAIT) {
            Some(ChatEvent::Message(message)) => assert_eq!(message, b"still here"),
            other => panic!("expected message, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_fit_to_record() {
        assert_eq!(fit_to_record("hello", 512), "hello");
        assert_eq!(fit_to_record("abcdefghij", 8), "abcdefg");
        // 'é' is two bytes; the cut must not land inside it.
        assert_eq!(fit_to_record("abcdeé", 7), "abcde");
    }
}
