/*!
Cryptographic components for the hybrid chat protocol.

This module provides the primitives the handshake and the secure channel
are built from: the DES block cipher and the RSA key pair engine.
*/

// Bit packing helpers
pub mod bits;

// Fixed cipher tables
pub mod tables;

// Symmetric encryption
pub mod block_cipher;

// Modular arithmetic
pub mod arith;

// Asymmetric key pairs
pub mod key_pair;

// Re-export frequently used types
pub use block_cipher::{BlockCipher, SymmetricKey};
pub use key_pair::{KeyPair, PublicKey};
