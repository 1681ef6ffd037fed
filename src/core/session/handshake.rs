/*!
Hybrid key exchange.

The responder owns an RSA key pair and publishes `(e, n)`. The initiator
draws a random 8-byte session key, encrypts each byte separately under
`(e, n)` and returns the eight ciphertext integers. The responder decrypts
them and keeps the low 8 bits of each.

[`Handshake`] only computes records and tracks state. Moving the records
over a transport is left to the drivers in `protocol`.
*/

use std::fmt;

use byteorder::{ByteOrder, NativeEndian};
use rand::Rng;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::core::{
    config::ChatConfig,
    constants::sizes::{KEY_SIZE, PUBLIC_KEY_RECORD, SESSION_KEY_RECORD, WIRE_INT_SIZE},
    crypto::{KeyPair, PublicKey, SymmetricKey},
    error::{Error, KeyGenerationFailure, Result},
    session::{
        channel::SecureChannel,
        state::{HandshakeState, Role, StateManager},
    },
};
use crate::keygen_err;

/// Handshake state machine for one endpoint
pub struct Handshake {
    state: StateManager,
    config: ChatConfig,
    key_pair: Option<KeyPair>,
    peer_key: Option<PublicKey>,
    session_key: Option<SymmetricKey>,
}

impl Handshake {
    /// Start a responder handshake
    pub fn responder(config: ChatConfig) -> Self {
        Self {
            state: StateManager::new(Role::Responder),
            config,
            key_pair: None,
            peer_key: None,
            session_key: None,
        }
    }

    /// Start an initiator handshake with a fresh random session key
    pub fn initiator(config: ChatConfig) -> Self {
        Self::initiator_with_key(config, SymmetricKey::random())
    }

    /// Start an initiator handshake that will transport `session_key`
    pub fn initiator_with_key(config: ChatConfig, session_key: SymmetricKey) -> Self {
        Self {
            state: StateManager::new(Role::Initiator),
            config,
            key_pair: None,
            peer_key: None,
            session_key: Some(session_key),
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state.state()
    }

    /// Role of this endpoint
    pub fn role(&self) -> Role {
        self.state.role()
    }

    /// Configuration the handshake runs under
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Session key, once known to this side
    pub fn session_key(&self) -> Option<&SymmetricKey> {
        self.session_key.as_ref()
    }

    /// Public key received from the responder
    pub fn peer_key(&self) -> Option<&PublicKey> {
        self.peer_key.as_ref()
    }

    /// Key pair generated by the responder
    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// Abandon the handshake
    pub fn fail(&mut self) {
        self.state.transition_to_failed();
    }

    /// Generate the responder key pair with the thread RNG
    pub fn generate_keys(&mut self) -> Result<PublicKey> {
        self.generate_keys_with(&mut rand::rng())
    }

    /// Generate the responder key pair, retrying on generation failure.
    ///
    /// Gives up with [`KeyGenerationFailure::RetriesExhausted`] after
    /// `keygen_attempts` failures.
    pub fn generate_keys_with<R: Rng>(&mut self, rng: &mut R) -> Result<PublicKey> {
        let rounds = self.config.primality_rounds;
        self.generate_keys_from(|| KeyPair::generate_with(rng, rounds))
    }

    /// Retry loop around one key pair generation attempt
    pub(crate) fn generate_keys_from<F>(&mut self, mut generate: F) -> Result<PublicKey>
    where
        F: FnMut() -> Result<KeyPair>,
    {
        self.state.ensure_can_transition(HandshakeState::KeysGenerated)?;

        let attempts = self.config.keygen_attempts;
        for attempt in 1..=attempts {
            match generate() {
                Ok(pair) => return self.install_key_pair(pair),
                Err(err @ Error::KeyGeneration(_)) => {
                    warn!(attempt, attempts, error = %err, "Key pair generation failed");
                }
                Err(err) => {
                    self.fail();
                    return Err(err);
                }
            }
        }

        self.fail();
        keygen_err!(KeyGenerationFailure::RetriesExhausted(attempts))
    }

    /// Install an already built key pair
    pub fn install_key_pair(&mut self, pair: KeyPair) -> Result<PublicKey> {
        self.state.transition(HandshakeState::KeysGenerated)?;
        let (p, q) = pair.primes();
        debug!(
            p,
            q,
            n = pair.modulus(),
            phi = pair.phi(),
            e = pair.public_exponent(),
            "Responder key pair ready"
        );
        let public_key = pair.public_key();
        self.key_pair = Some(pair);
        Ok(public_key)
    }

    /// Public key record to send to the initiator
    pub fn public_key_record(&mut self) -> Result<[u8; PUBLIC_KEY_RECORD]> {
        self.state.ensure_can_transition(HandshakeState::PublicKeySent)?;
        let record = match &self.key_pair {
            Some(pair) => pair.public_key().to_bytes(),
            None => {
                self.fail();
                return Err(Error::InvalidKey("no key pair installed".into()));
            }
        };
        self.state.transition(HandshakeState::PublicKeySent)?;
        Ok(record)
    }

    /// Recover the session key from the initiator's record
    pub fn accept_session_key(&mut self, record: &[u8]) -> Result<()> {
        self.state.ensure_can_transition(HandshakeState::SessionKeyReceived)?;
        if record.len() != SESSION_KEY_RECORD {
            self.fail();
            return Err(Error::InvalidKey(format!(
                "session key record must be {} bytes, got {}",
                SESSION_KEY_RECORD,
                record.len()
            )));
        }
        let pair = match &self.key_pair {
            Some(pair) => pair,
            None => {
                self.fail();
                return Err(Error::InvalidKey("no key pair installed".into()));
            }
        };

        let mut key = [0u8; KEY_SIZE];
        for (byte, chunk) in key.iter_mut().zip(record.chunks_exact(WIRE_INT_SIZE)) {
            *byte = pair.decrypt(NativeEndian::read_u64(chunk)) as u8;
        }
        self.session_key = Some(SymmetricKey::new(key));
        key.zeroize();

        self.state.transition(HandshakeState::SessionKeyReceived)
    }

    /// Parse the responder's public key record
    pub fn receive_public_key(&mut self, record: &[u8]) -> Result<PublicKey> {
        self.state.ensure_can_transition(HandshakeState::PublicKeyReceived)?;
        let public_key = match PublicKey::from_bytes(record) {
            Ok(key) => key,
            Err(err) => {
                self.fail();
                return Err(err);
            }
        };
        debug!(e = public_key.exponent(), n = public_key.modulus(), "Received peer public key");
        self.peer_key = Some(public_key);
        self.state.transition(HandshakeState::PublicKeyReceived)?;
        Ok(public_key)
    }

    /// Encrypt the session key byte by byte under the peer's public key
    pub fn encrypt_session_key(&mut self) -> Result<[u8; SESSION_KEY_RECORD]> {
        self.state.ensure_can_transition(HandshakeState::SessionKeyEncrypted)?;
        let (peer_key, session_key) = match (&self.peer_key, &self.session_key) {
            (Some(peer_key), Some(session_key)) => (peer_key, session_key),
            _ => {
                self.fail();
                return Err(Error::InvalidKey("session key or peer key missing".into()));
            }
        };

        let mut record = [0u8; SESSION_KEY_RECORD];
        for (&byte, chunk) in session_key
            .as_bytes()
            .iter()
            .zip(record.chunks_exact_mut(WIRE_INT_SIZE))
        {
            NativeEndian::write_u64(chunk, peer_key.encrypt(u32::from(byte)));
        }

        self.state.transition(HandshakeState::SessionKeyEncrypted)?;
        Ok(record)
    }

    /// Record that the encrypted session key went out
    pub fn mark_sent(&mut self) -> Result<()> {
        self.state.transition(HandshakeState::SessionKeySent)
    }

    /// Finish the handshake and hand over the shared key
    pub fn into_channel(mut self) -> Result<SecureChannel> {
        self.state.ensure_can_transition(HandshakeState::Established)?;
        let key = match self.session_key.take() {
            Some(key) => key,
            None => {
                self.fail();
                return Err(Error::InvalidKey("no session key".into()));
            }
        };
        self.state.transition(HandshakeState::Established)?;
        Ok(SecureChannel::new(key, &self.config))
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("role", &self.role())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
