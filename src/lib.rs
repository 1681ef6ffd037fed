/*!
# Hybrid Chat

An end-to-end encrypted two-party chat. A DES block cipher protects the
traffic; the DES session key is carried to the peer under an RSA key pair
generated for each session.

## Overview

This library provides:

- DES with the standard tables and whole-block padding
- RSA key pairs over two ~32-bit primes, with Miller-Rabin primality testing
- A handshake state machine for both roles that moves the session key
- A secure channel that seals and opens chat records
- A threaded chat session over TCP or an in-process transport

## Security

The construction is historical: 56-bit DES keys, small RSA moduli and no
message authentication. Peer public keys are trusted on first use. Do not use
it to protect anything that matters.
*/

// Core protocol components
pub mod core;

// Protocol implementation
pub mod protocol;

// Re-export commonly used types for convenience
pub use crate::core::config::ChatConfig;
pub use crate::core::constants::sizes;
pub use crate::core::crypto::{BlockCipher, KeyPair, PublicKey, SymmetricKey};
pub use crate::core::error::{CipherError, Error, KeyGenerationFailure, Result};
pub use crate::core::session::{Handshake, HandshakeState, Incoming, Role, SecureChannel};

// Re-export protocol drivers
pub use crate::protocol::{
    ChatEvent, ChatSession, Initiator, MemoryTransport, Responder, TcpTransport, Transport,
};
