/*!
Listening side of the protocol.

The responder accepts one peer, generates an RSA key pair, publishes the
public half and recovers the session key the peer sends back.
*/

use std::net::TcpListener;

use tracing::{error, info};

use crate::core::{
    config::ChatConfig,
    constants::sizes::SESSION_KEY_RECORD,
    crypto::KeyPair,
    error::{Error, Result},
    session::{Handshake, SecureChannel},
};

use super::{
    chat::ChatSession,
    transport::{TcpTransport, Transport},
};

/// Listening endpoint
#[derive(Debug, Clone)]
pub struct Responder {
    config: ChatConfig,
}

impl Responder {
    /// Create a responder, rejecting an invalid configuration
    pub fn new(config: ChatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Bind the configured address
    pub fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.address)?;
        info!(address = %listener.local_addr()?, "Listening");
        Ok(listener)
    }

    /// Bind, wait for one peer, run the handshake and start the session
    pub fn listen(&self) -> Result<ChatSession<TcpTransport>> {
        let listener = self.bind()?;
        self.accept(&listener)
    }

    /// Wait for one peer on `listener`, run the handshake and start the session
    pub fn accept(&self, listener: &TcpListener) -> Result<ChatSession<TcpTransport>> {
        let mut transport = TcpTransport::accept(listener, self.config.accept_timeout)?;
        let channel = self.handshake(&mut transport)?;
        ChatSession::start(transport, channel, &self.config)
    }

    /// Run the responder handshake over `transport` with a fresh key pair
    pub fn handshake<T: Transport>(&self, transport: &mut T) -> Result<SecureChannel> {
        let mut handshake = Handshake::responder(self.config.clone());
        handshake.generate_keys()?;
        self.complete(transport, handshake)
    }

    /// Run the responder handshake over `transport` with a given key pair
    pub fn handshake_with_key_pair<T: Transport>(
        &self,
        transport: &mut T,
        key_pair: KeyPair,
    ) -> Result<SecureChannel> {
        let mut handshake = Handshake::responder(self.config.clone());
        handshake.install_key_pair(key_pair)?;
        self.complete(transport, handshake)
    }

    fn complete<T: Transport>(&self, transport: &mut T, mut handshake: Handshake) -> Result<SecureChannel> {
        let record = handshake.public_key_record()?;
        transport
            .send(&record)
            .map_err(|err| abort(&mut handshake, err))?;

        let mut reply = [0u8; SESSION_KEY_RECORD];
        transport
            .receive_exact(&mut reply, self.config.handshake_timeout, "session key")
            .map_err(|err| abort(&mut handshake, err))?;

        handshake.accept_session_key(&reply)?;
        let channel = handshake.into_channel()?;
        info!("Handshake complete, session key received");
        Ok(channel)
    }
}

fn abort(handshake: &mut Handshake, err: Error) -> Error {
    error!(state = %handshake.state(), error = %err, "Responder handshake failed");
    handshake.fail();
    err
}
