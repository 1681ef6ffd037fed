/*!
Runtime configuration for a chat session.

Every bound the protocol relies on (record size, wait bounds, retry counts)
lives here so the listener and the connector agree on them.
*/

use std::time::Duration;

use crate::core::{
    constants::{defaults, keygen, sizes},
    error::{Error, Result},
};

/// Configuration shared by both roles
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct ChatConfig {
    /// Address to listen on (listener) or connect to (connector)
    pub address: String,
    /// Largest chat record, in bytes
    pub max_message_size: usize,
    /// Wait bound for reaching the listener
    pub connect_timeout: Duration,
    /// Wait bound for a peer to connect
    pub accept_timeout: Duration,
    /// Wait bound for each handshake receive
    pub handshake_timeout: Duration,
    /// Poll tick of the inbound worker
    pub poll_interval: Duration,
    /// Key pair generation attempts
    pub keygen_attempts: u32,
    /// Miller-Rabin rounds per candidate
    pub primality_rounds: u32,
    /// Plaintext that ends the session
    pub exit_command: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            address: defaults::ADDRESS.to_string(),
            max_message_size: defaults::MAX_MESSAGE_SIZE,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            accept_timeout: defaults::ACCEPT_TIMEOUT,
            handshake_timeout: defaults::HANDSHAKE_TIMEOUT,
            poll_interval: defaults::POLL_INTERVAL,
            keygen_attempts: defaults::KEYGEN_ATTEMPTS,
            primality_rounds: keygen::MILLER_RABIN_ROUNDS,
            exit_command: defaults::EXIT_COMMAND.to_string(),
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the largest chat record
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the connect wait bound
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the accept wait bound
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Set the handshake receive wait bound
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the inbound poll tick
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the number of key generation attempts
    pub fn with_keygen_attempts(mut self, attempts: u32) -> Self {
        self.keygen_attempts = attempts;
        self
    }

    /// Set the Miller-Rabin round count
    pub fn with_primality_rounds(mut self, rounds: u32) -> Self {
        self.primality_rounds = rounds;
        self
    }

    /// Set the end-of-session sentinel
    pub fn with_exit_command(mut self, command: impl Into<String>) -> Self {
        self.exit_command = command.into();
        self
    }

    /// Largest plaintext that still fits in one record
    pub fn max_plaintext_len(&self) -> usize {
        // Padding always adds at least one byte.
        self.max_message_size.saturating_sub(1)
    }

    /// Check the configuration for values the protocol cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::Config("address must not be empty".into()));
        }
        if self.max_message_size < 2 * sizes::BLOCK_SIZE
            || self.max_message_size % sizes::BLOCK_SIZE != 0
        {
            return Err(Error::Config(format!(
                "max_message_size must be a multiple of {} and at least {}, got {}",
                sizes::BLOCK_SIZE,
                2 * sizes::BLOCK_SIZE,
                self.max_message_size
            )));
        }
        if self.poll_interval.is_zero() || self.handshake_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        if self.keygen_attempts == 0 {
            return Err(Error::Config("keygen_attempts must be at least 1".into()));
        }
        if self.primality_rounds == 0 {
            return Err(Error::Config("primality_rounds must be at least 1".into()));
        }
        if self.exit_command.is_empty() || self.exit_command.len() > self.max_plaintext_len() {
            return Err(Error::Config("exit_command must fit in one record".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.address, "127.0.0.1:8888");
        assert_eq!(config.max_message_size, 512);
        assert_eq!(config.max_plaintext_len(), 511);
        assert_eq!(config.keygen_attempts, 3);
        assert_eq!(config.primality_rounds, 50);
        assert_eq!(config.exit_command, "quit");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ChatConfig::new()
            .with_address("0.0.0.0:9000")
            .with_handshake_timeout(Duration::from_millis(250))
            .with_exit_command("bye");

        assert_eq!(config.address, "0.0.0.0:9000");
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
        assert_eq!(config.exit_command, "bye");
    }

    #[test]
    fn test_validation() {
        assert!(ChatConfig::new().with_max_message_size(500).validate().is_err());
        assert!(ChatConfig::new().with_max_message_size(8).validate().is_err());
        assert!(ChatConfig::new().with_keygen_attempts(0).validate().is_err());
        assert!(ChatConfig::new().with_primality_rounds(0).validate().is_err());
        assert!(ChatConfig::new().with_exit_command("").validate().is_err());
        assert!(ChatConfig::new().with_poll_interval(Duration::ZERO).validate().is_err());
        assert!(ChatConfig::new().with_max_message_size(16).validate().is_ok());
    }
}
