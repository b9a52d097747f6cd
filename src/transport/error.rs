#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;
/// WebSocket close code sent when the client goes away.
pub const GOING_AWAY: u16 = 1001;
/// Close code reported when the peer sent a close frame without a status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Transport error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum TransportError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tungstenite::Error),
    /// The peer closed the connection with a close frame
    Closed {
        /// Close code sent by the peer
        code: u16,
        /// Close reason sent by the peer
        reason: String,
    },
    /// No pong arrived for a liveness probe within the configured timeout
    HeartbeatTimeout(Duration),
    /// The opening handshake did not complete within the configured timeout
    HandshakeTimeout(Duration),
    /// There is no live connection to send on
    NotConnected,
    /// The connection driver went away without a close frame
    LinkDropped,
}

impl TransportError {
    /// Normalized numeric code for this failure.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::Connection(tungstenite::Error::Io(e)) => {
                e.raw_os_error().map_or(-1, i64::from)
            }
            Self::Connection(tungstenite::Error::Http(response)) => {
                i64::from(response.status().as_u16())
            }
            Self::Connection(_) => -1,
            Self::Closed { code, .. } => i64::from(*code),
            Self::HeartbeatTimeout(_) => -2,
            Self::NotConnected => -3,
            Self::LinkDropped => -4,
            Self::HandshakeTimeout(_) => -5,
        }
    }

    /// Whether the peer ended the connection with a normal-closure close frame.
    #[must_use]
    pub fn is_normal_close(&self) -> bool {
        matches!(
            self,
            Self::Closed {
                code: NORMAL_CLOSURE,
                ..
            }
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::Closed { code, reason } if reason.is_empty() => {
                write!(f, "WebSocket closed by peer with code {code}")
            }
            Self::Closed { code, reason } => {
                write!(f, "WebSocket closed by peer with code {code}: {reason}")
            }
            Self::HeartbeatTimeout(timeout) => {
                write!(f, "Heartbeat timeout: no pong received within {timeout:?}")
            }
            Self::HandshakeTimeout(timeout) => {
                write!(f, "WebSocket handshake did not complete within {timeout:?}")
            }
            Self::NotConnected => write!(f, "No active WebSocket connection"),
            Self::LinkDropped => write!(f, "WebSocket connection dropped"),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for crate::error::Error {
    fn from(e: TransportError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::Transport, e)
    }
}

impl From<tungstenite::Error> for crate::error::Error {
    fn from(e: tungstenite::Error) -> Self {
        crate::error::Error::with_source(
            crate::error::Kind::Transport,
            TransportError::Connection(e),
        )
    }
}
