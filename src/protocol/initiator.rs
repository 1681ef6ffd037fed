/*!
Connecting side of the protocol.

The initiator draws the session key, waits for the responder's public key
and returns the session key encrypted byte by byte under it.
*/

use tracing::{error, info};

use crate::core::{
    config::ChatConfig,
    constants::sizes::PUBLIC_KEY_RECORD,
    crypto::SymmetricKey,
    error::{Error, Result},
    session::{Handshake, SecureChannel},
};

use super::{
    chat::ChatSession,
    transport::{TcpTransport, Transport},
};

/// Connecting endpoint
#[derive(Debug, Clone)]
pub struct Initiator {
    config: ChatConfig,
}

impl Initiator {
    /// Create an initiator, rejecting an invalid configuration
    pub fn new(config: ChatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Connect to the configured address, run the handshake and start the session
    pub fn connect(&self) -> Result<ChatSession<TcpTransport>> {
        let mut transport = TcpTransport::connect(&self.config.address, self.config.connect_timeout)?;
        let channel = self.handshake(&mut transport)?;
        ChatSession::start(transport, channel, &self.config)
    }

    /// Run the initiator handshake over `transport` with a random session key
    pub fn handshake<T: Transport>(&self, transport: &mut T) -> Result<SecureChannel> {
        self.complete(transport, Handshake::initiator(self.config.clone()))
    }

    /// Run the initiator handshake over `transport`, transporting `session_key`
    pub fn handshake_with_key<T: Transport>(
        &self,
        transport: &mut T,
        session_key: SymmetricKey,
    ) -> Result<SecureChannel> {
        self.complete(
            transport,
            Handshake::initiator_with_key(self.config.clone(), session_key),
        )
    }

    fn complete<T: Transport>(&self, transport: &mut T, mut handshake: Handshake) -> Result<SecureChannel> {
        let mut record = [0u8; PUBLIC_KEY_RECORD];
        transport
            .receive_exact(&mut record, self.config.handshake_timeout, "public key")
            .map_err(|err| abort(&mut handshake, err))?;
        handshake.receive_public_key(&record)?;

        let reply = handshake.encrypt_session_key()?;
        transport
            .send(&reply)
            .map_err(|err| abort(&mut handshake, err))?;
        handshake.mark_sent()?;

        let channel = handshake.into_channel()?;
        info!("Handshake complete, session key sent");
        Ok(channel)
    }
}

fn abort(handshake: &mut Handshake, err: Error) -> Error {
    error!(state = %handshake.state(), error = %err, "Initiator handshake failed");
    handshake.fail();
    err
}
