//! Protocol implementation for the hybrid chat.
//!
//! This module runs the handshake over a byte transport and drives the
//! established chat session.

// Byte transports
pub mod transport;

// In-process transport
pub mod memory;

// Listening side
pub mod responder;

// Connecting side
pub mod initiator;

// Running session
pub mod chat;

// Re-export for convenience
pub use chat::{ChatEvent, ChatSession};
pub use initiator::Initiator;
pub use memory::MemoryTransport;
pub use responder::Responder;
pub use transport::{TcpTransport, Transport};
