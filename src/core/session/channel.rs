/*!
Secure channel for application traffic.

Wraps the shared session key once the handshake has completed. Every chat
message becomes exactly one record: the padded block cipher output of its
plaintext.
*/

use std::fmt;

use crate::core::{
    config::ChatConfig,
    constants::sizes::BLOCK_SIZE,
    crypto::{BlockCipher, SymmetricKey},
    error::{Error, Result},
};

/// A decrypted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Application message
    Message(Vec<u8>),
    /// The peer sent the exit command
    EndOfSession,
}

/// Session-scoped encryptor and decryptor
///
/// Read-only once built, so one instance can be shared between the
/// sending and receiving halves of a session.
pub struct SecureChannel {
    cipher: BlockCipher,
    max_message_size: usize,
    exit_command: Vec<u8>,
}

impl SecureChannel {
    /// Build a channel for `key` with the record bounds from `config`
    pub fn new(key: SymmetricKey, config: &ChatConfig) -> Self {
        Self {
            cipher: BlockCipher::new(key),
            max_message_size: config.max_message_size,
            exit_command: config.exit_command.as_bytes().to_vec(),
        }
    }

    /// Build a channel for `key` with default bounds
    pub fn with_key(key: SymmetricKey) -> Self {
        Self::new(key, &ChatConfig::default())
    }

    /// The shared session key
    pub fn key(&self) -> &SymmetricKey {
        self.cipher.key()
    }

    /// Largest record this channel sends or accepts
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Longest plaintext that still fits in one record
    pub fn max_plaintext_len(&self) -> usize {
        (self.max_message_size / BLOCK_SIZE) * BLOCK_SIZE - 1
    }

    /// The plaintext that ends the session
    pub fn exit_command(&self) -> &[u8] {
        &self.exit_command
    }

    /// Whether `plaintext` is the exit command
    pub fn is_exit_command(&self, plaintext: &[u8]) -> bool {
        plaintext == self.exit_command.as_slice()
    }

    /// Encrypt one message into a record
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let record_len = (plaintext.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
        if record_len > self.max_message_size {
            return Err(Error::MessageTooLarge {
                len: record_len,
                max: self.max_message_size,
            });
        }
        Ok(self.cipher.encrypt_buffer(plaintext))
    }

    /// Encrypt the exit command
    pub fn seal_exit(&self) -> Result<Vec<u8>> {
        self.seal(&self.exit_command)
    }

    /// Decrypt one record
    pub fn open(&self, record: &[u8]) -> Result<Incoming> {
        let plaintext = self.cipher.decrypt_buffer(record)?;
        if self.is_exit_command(&plaintext) {
            Ok(Incoming::EndOfSession)
        } else {
            Ok(Incoming::Message(plaintext))
        }
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}
