/*!
Handshake state management.

This module defines the handshake phases for both roles and the state
machine that enforces their order.
*/

use std::fmt;

use tracing::debug;

use crate::core::error::Result;
use crate::invalid_state_err;

/// Handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Nothing exchanged yet
    Idle,
    /// Key pair generated (responder)
    KeysGenerated,
    /// Public key handed to the transport (responder)
    PublicKeySent,
    /// Peer public key parsed (initiator)
    PublicKeyReceived,
    /// Session key encrypted under the peer key (initiator)
    SessionKeyEncrypted,
    /// Encrypted session key handed to the transport (initiator)
    SessionKeySent,
    /// Session key recovered from the peer record (responder)
    SessionKeyReceived,
    /// Both sides hold the session key
    Established,
    /// Handshake abandoned
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Idle => write!(f, "Idle"),
            HandshakeState::KeysGenerated => write!(f, "KeysGenerated"),
            HandshakeState::PublicKeySent => write!(f, "PublicKeySent"),
            HandshakeState::PublicKeyReceived => write!(f, "PublicKeyReceived"),
            HandshakeState::SessionKeyEncrypted => write!(f, "SessionKeyEncrypted"),
            HandshakeState::SessionKeySent => write!(f, "SessionKeySent"),
            HandshakeState::SessionKeyReceived => write!(f, "SessionKeyReceived"),
            HandshakeState::Established => write!(f, "Established"),
            HandshakeState::Failed => write!(f, "Failed"),
        }
    }
}

/// Endpoint role in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connects, generates the session key
    Initiator,
    /// Listens, owns the key pair
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "Initiator"),
            Role::Responder => write!(f, "Responder"),
        }
    }
}

/// Handshake state manager
///
/// States only move forward along the path for the endpoint's role. Any
/// request to move elsewhere puts the machine in [`HandshakeState::Failed`].
#[derive(Debug, Clone, Copy)]
pub struct StateManager {
    /// Current state of the handshake
    state: HandshakeState,
    /// Role of this endpoint
    role: Role,
}

impl StateManager {
    /// Create a new state manager
    pub fn new(role: Role) -> Self {
        Self {
            state: HandshakeState::Idle,
            role,
        }
    }

    /// Get the current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Get the role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check if the handshake is in the given state
    pub fn is_state(&self, state: HandshakeState) -> bool {
        self.state == state
    }

    /// Check if the handshake has completed
    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Check if the handshake was abandoned
    pub fn is_failed(&self) -> bool {
        self.state == HandshakeState::Failed
    }

    /// The state this role must be in to move to `target`
    pub fn required_state(&self, target: HandshakeState) -> Option<HandshakeState> {
        use HandshakeState::*;

        match (self.role, target) {
            (Role::Responder, KeysGenerated) => Some(Idle),
            (Role::Responder, PublicKeySent) => Some(KeysGenerated),
            (Role::Responder, SessionKeyReceived) => Some(PublicKeySent),
            (Role::Responder, Established) => Some(SessionKeyReceived),
            (Role::Initiator, PublicKeyReceived) => Some(Idle),
            (Role::Initiator, SessionKeyEncrypted) => Some(PublicKeyReceived),
            (Role::Initiator, SessionKeySent) => Some(SessionKeyEncrypted),
            (Role::Initiator, Established) => Some(SessionKeySent),
            _ => None,
        }
    }

    /// Check that moving to `target` is allowed, failing the machine if not
    pub fn ensure_can_transition(&mut self, target: HandshakeState) -> Result<()> {
        let actual = self.state;
        match self.required_state(target) {
            Some(required) if required == actual => Ok(()),
            Some(required) => {
                self.transition_to_failed();
                invalid_state_err!(required, actual)
            }
            None => {
                self.transition_to_failed();
                invalid_state_err!(format!("a {} state", self.role), actual)
            }
        }
    }

    /// Move to `target`, failing the machine if the move is out of order
    pub fn transition(&mut self, target: HandshakeState) -> Result<()> {
        self.ensure_can_transition(target)?;
        debug!(role = %self.role, from = %self.state, to = %target, "Handshake transition");
        self.state = target;
        Ok(())
    }

    /// Transition to the failed state
    pub fn transition_to_failed(&mut self) {
        if self.state != HandshakeState::Failed {
            debug!(role = %self.role, from = %self.state, "Handshake failed");
        }
        self.state = HandshakeState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    #[test]
    fn test_responder_transitions() -> Result<()> {
        let mut manager = StateManager::new(Role::Responder);
        assert_eq!(manager.state(), HandshakeState::Idle);

        manager.transition(HandshakeState::KeysGenerated)?;
        manager.transition(HandshakeState::PublicKeySent)?;
        manager.transition(HandshakeState::SessionKeyReceived)?;
        manager.transition(HandshakeState::Established)?;
        assert!(manager.is_established());
        Ok(())
    }

    #[test]
    fn test_initiator_transitions() -> Result<()> {
        let mut manager = StateManager::new(Role::Initiator);

        manager.transition(HandshakeState::PublicKeyReceived)?;
        manager.transition(HandshakeState::SessionKeyEncrypted)?;
        manager.transition(HandshakeState::SessionKeySent)?;
        manager.transition(HandshakeState::Established)?;
        assert!(manager.is_established());
        Ok(())
    }

    #[test]
    fn test_skipping_ahead_fails() {
        let mut manager = StateManager::new(Role::Responder);

        match manager.transition(HandshakeState::PublicKeySent) {
            Err(Error::InvalidState { expected, actual }) => {
                assert_eq!(expected, "KeysGenerated");
                assert_eq!(actual, "Idle");
            }
            other => panic!("expected InvalidState, got {:?}", other),
        }
        assert!(manager.is_failed());

        // Failed is terminal.
        assert!(manager.transition(HandshakeState::KeysGenerated).is_err());
        assert!(manager.is_failed());
    }

    #[test]
    fn test_role_permissions() {
        let mut responder = StateManager::new(Role::Responder);
        assert!(responder.transition(HandshakeState::PublicKeyReceived).is_err());
        assert!(responder.is_failed());

        let mut initiator = StateManager::new(Role::Initiator);
        assert!(initiator.transition(HandshakeState::KeysGenerated).is_err());
        assert!(initiator.is_failed());
    }

    #[test]
    fn test_no_move_back() -> Result<()> {
        let mut manager = StateManager::new(Role::Initiator);
        manager.transition(HandshakeState::PublicKeyReceived)?;
        assert!(manager.transition(HandshakeState::PublicKeyReceived).is_err());
        assert_eq!(manager.state(), HandshakeState::Failed);
        Ok(())
    }
}
