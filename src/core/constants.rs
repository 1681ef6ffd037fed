/*!
Constants for the hybrid chat protocol.

This module contains the protocol constants: block and key sizes, handshake
record sizes and key generation parameters.
*/

/// Size constants for the protocol
pub mod sizes {
    /// Block cipher block size in bytes
    pub const BLOCK_SIZE: usize = 8;

    /// Symmetric key size in bytes
    pub const KEY_SIZE: usize = 8;

    /// Size of one round subkey in bytes (48 bits)
    pub const SUBKEY_SIZE: usize = 6;

    /// Number of Feistel rounds
    pub const ROUNDS: usize = 16;

    /// Width of one handshake integer on the wire
    pub const WIRE_INT_SIZE: usize = 8;

    /// Public key record: exponent then modulus
    pub const PUBLIC_KEY_RECORD: usize = 2 * WIRE_INT_SIZE;

    /// Session key record: one encrypted integer per key byte
    pub const SESSION_KEY_RECORD: usize = KEY_SIZE * WIRE_INT_SIZE;
}

/// Key pair generation parameters
pub mod keygen {
    /// Smallest prime candidate drawn for p and q
    pub const PRIME_MIN: u64 = 0x2000_0000;

    /// Largest prime candidate drawn for p and q
    pub const PRIME_MAX: u64 = 0xFFFF_FFFF;

    /// First public exponent tried
    pub const PUBLIC_EXPONENT_START: u64 = 65537;

    /// Miller-Rabin rounds used unless configured otherwise
    pub const MILLER_RABIN_ROUNDS: u32 = 50;
}

/// Configuration defaults
pub mod defaults {
    use std::time::Duration;

    /// Default address to listen on or connect to
    pub const ADDRESS: &str = "127.0.0.1:8888";

    /// Largest chat record in bytes
    pub const MAX_MESSAGE_SIZE: usize = 512;

    /// Wait bound for the connector to reach the listener
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Wait bound for the listener to see a connection
    pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Wait bound for each handshake receive
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll tick of the inbound worker
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Key pair generation attempts before the session is abandoned
    pub const KEYGEN_ATTEMPTS: u32 = 3;

    /// Plaintext that ends the session
    pub const EXIT_COMMAND: &str = "quit";
}
