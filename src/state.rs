#![expect(
    clippy::module_name_repetitions,
    reason = "ConnectionState is the name exposed to observers"
)]

use std::fmt;

use crate::error::SessionError;

/// Connection state tracking. Exactly one state is current at a time.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempted yet
    #[default]
    Idle,
    /// First handshake of a lifecycle in flight
    Connecting,
    /// A probe or inbound frame succeeded since the last (re)connect
    Connected,
    /// The previous connection dropped; the next attempt is scheduled
    Reconnecting {
        /// Current reconnection attempt number, starting at 1
        attempt: u32,
    },
    /// Reconnection attempts exhausted; carries the last failure
    Failed(SessionError),
    /// Stopped by the caller (`None`) or closed normally by the server
    Closed(Option<SessionError>),
}

impl ConnectionState {
    /// A connection exists or is being (re)established.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. }
        )
    }

    /// No further automatic transitions will happen until the next `start()`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Closed(_))
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Waiting on a handshake or the first sign of life after one.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Closed(None) => write!(f, "closed"),
            Self::Closed(Some(e)) => write!(f, "closed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn activity_classification() {
        let failed = ConnectionState::Failed(SessionError::new(Kind::Transport, -4, "dropped"));

        assert!(!ConnectionState::Idle.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(ConnectionState::Reconnecting { attempt: 2 }.is_active());
        assert!(!failed.is_active());
        assert!(failed.is_terminal());
        assert!(ConnectionState::Closed(None).is_terminal());
        assert!(!ConnectionState::Idle.is_terminal());
    }

    #[test]
    fn pending_excludes_connected() {
        assert!(ConnectionState::Connecting.is_pending());
        assert!(ConnectionState::Reconnecting { attempt: 1 }.is_pending());
        assert!(!ConnectionState::Connected.is_pending());
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "reconnecting (attempt 3)"
        );
        assert_eq!(ConnectionState::Closed(None).to_string(), "closed");
    }
}
