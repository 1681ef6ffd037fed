/*!
Error handling for the hybrid chat protocol.

Cryptographic failures carry only coarse details so that a peer probing
with forged records learns nothing beyond "malformed".
*/

use std::io;
use thiserror::Error;

/// Result type for the hybrid chat protocol
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the hybrid chat protocol
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Key pair generation failed
    #[error("Key generation failed")]
    KeyGeneration(#[source] KeyGenerationFailure),

    /// The peer did not answer within the wait bound
    #[error("Timed out after {timeout_ms} ms waiting for {stage}")]
    HandshakeTimeout {
        stage: &'static str,
        timeout_ms: u64,
    },

    /// Peer disconnected or a zero-length read was observed
    #[error("Transport closed by peer")]
    TransportClosed,

    /// Ciphertext could not be decrypted into a well-formed plaintext
    #[error("Malformed ciphertext")]
    MalformedCiphertext(#[source] CipherError),

    /// Operation attempted in the wrong handshake state
    #[error("Handshake not in correct state: expected {expected}, but was {actual}")]
    InvalidState {
        expected: String,
        actual: String,
    },

    /// Outgoing message does not fit in one record
    #[error("Message of {len} bytes exceeds the {max} byte record limit")]
    MessageTooLarge {
        len: usize,
        max: usize,
    },

    /// Key material has the wrong shape
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Block cipher failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Ciphertext length is zero or not a multiple of the block size
    #[error("Ciphertext length {0} is not a positive multiple of 8")]
    InvalidLength(usize),

    /// Recovered pad count is outside 1..=8
    #[error("Invalid padding count {0}")]
    InvalidPadding(u8),
}

/// Key pair generation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyGenerationFailure {
    /// No public exponent below phi passed the checks
    #[error("No usable public exponent below phi")]
    ExponentSearchExhausted,

    /// Public exponent has no inverse modulo phi
    #[error("Public exponent has no modular inverse")]
    NoInverse,

    /// Supplied parameters cannot form a key pair
    #[error("Invalid key parameters: {0}")]
    InvalidParameters(&'static str),

    /// Every attempt allowed by the retry bound failed
    #[error("Key generation failed after {0} attempts")]
    RetriesExhausted(u32),
}

/// Create an invalid state error
#[macro_export]
macro_rules! invalid_state_err {
    ($expected:expr, $actual:expr) => {
        Err($crate::core::error::Error::InvalidState {
            expected: $expected.to_string(),
            actual: $actual.to_string(),
        })
    };
}

/// Create a malformed ciphertext error
#[macro_export]
macro_rules! cipher_err {
    ($err:expr) => {
        Err($crate::core::error::Error::MalformedCiphertext($err))
    };
}

/// Create a key generation error
#[macro_export]
macro_rules! keygen_err {
    ($err:expr) => {
        Err($crate::core::error::Error::KeyGeneration($err))
    };
}

impl Error {
    /// Whether this error ends the session rather than a single message
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::MalformedCiphertext(_) | Error::MessageTooLarge { .. })
    }
}

/// Convert from Error to io::Error (for compatibility)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            Error::KeyGeneration(e) => io::Error::new(io::ErrorKind::Other, e.to_string()),
            Error::HandshakeTimeout { stage, timeout_ms } => io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Timed out after {} ms waiting for {}", timeout_ms, stage),
            ),
            Error::TransportClosed => {
                io::Error::new(io::ErrorKind::ConnectionAborted, "Transport closed by peer")
            }
            Error::MalformedCiphertext(_) => {
                io::Error::new(io::ErrorKind::InvalidData, "Malformed ciphertext")
            }
            Error::InvalidState { expected, actual } => io::Error::new(
                io::ErrorKind::NotConnected,
                format!("Invalid state: expected {}, but was {}", expected, actual),
            ),
            Error::MessageTooLarge { len, max } => io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Message of {} bytes exceeds {} bytes", len, max),
            ),
            Error::InvalidKey(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            Error::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        }
    }
}
