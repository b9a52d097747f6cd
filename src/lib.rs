#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod codec;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod transport;

pub use codec::{ChatMessage, EnvelopeCodec, InboundMessage, MessageCodec, PlainTextCodec, RawPayload};
pub use config::{ReconnectConfig, SessionConfig};
pub use error::{Error, SessionError};
pub use session::{ChannelObserver, Session, SessionEvent, SessionObserver};
pub use state::ConnectionState;
pub use transport::{Frame, Transport, WsTransport};

pub type Result<T> = std::result::Result<T, Error>;
