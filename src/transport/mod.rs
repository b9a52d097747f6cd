//! Transport seam between the session controller and the network.
//!
//! A [`Transport`] opens one connection per call and hands back a [`Link`]: a cloneable
//! [`LinkHandle`] for writes, probes and closing, plus a [`FrameReceiver`] for inbound frames.
//! Implementations own the socket in a driver task that services the [`Peer`] side of
//! [`pair`].
//!
//! # Architecture
//!
//! - [`WsTransport`]: tungstenite-backed transport used by default
//! - [`pair`]: in-memory link for custom transports and test doubles

pub mod error;
pub mod link;
pub mod websocket;

use async_trait::async_trait;
use url::Url;

pub use error::{GOING_AWAY, NORMAL_CLOSURE, TransportError};
pub use link::{Command, FrameReceiver, Link, LinkHandle, Peer, pair};
pub use websocket::WsTransport;

use crate::Result;

/// A single transport-level frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Opens bidirectional message-stream connections.
///
/// Every successful [`Transport::open`] is a fresh connection instance; the session controller
/// never opens a second one while the first is live.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `endpoint`, attaching `headers` to the handshake.
    async fn open(&self, endpoint: &Url, headers: &[(String, String)]) -> Result<Link>;
}
