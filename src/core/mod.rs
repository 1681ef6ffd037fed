//! Core components for the hybrid chat protocol.
//!
//! This module contains the fundamental building blocks of the protocol,
//! including cryptographic primitives, the handshake, configuration and
//! error handling.

// Export cryptographic functionality
pub mod crypto;

// Export session establishment
pub mod session;

// Runtime configuration
pub mod config;

// Protocol constants
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::config::ChatConfig;
pub use self::error::{CipherError, Error, KeyGenerationFailure, Result};
pub use self::session::{HandshakeState, Role};
