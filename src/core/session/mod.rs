/*!
Session establishment for the hybrid chat protocol.

This module provides the handshake state machine and the secure channel it
produces.
*/

// State management
pub mod state;

// Key exchange
pub mod handshake;

// Application traffic
pub mod channel;

// Re-export main session types
pub use self::channel::{Incoming, SecureChannel};
pub use self::handshake::Handshake;
pub use self::state::{HandshakeState, Role, StateManager};
