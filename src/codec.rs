//! Application-level message envelope carried over transport frames.

#![expect(
    clippy::module_name_repetitions,
    reason = "Codec types deliberately include the module name for clarity"
)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::transport::Frame;

/// Structured chat record decoded from an envelope.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new<T: Into<String>, S: Into<String>>(text: T, sender: S) -> Self {
        Self {
            text: text.into(),
            sender: sender.into(),
        }
    }
}

/// Payload that could not be decoded into a structured record.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    Text(String),
    Binary(Vec<u8>),
}

/// An inbound message. Consumers must handle both variants.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Chat(ChatMessage),
    Raw(RawPayload),
}

impl InboundMessage {
    #[must_use]
    pub fn raw_text<S: Into<String>>(text: S) -> Self {
        Self::Raw(RawPayload::Text(text.into()))
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(message) => write!(f, "{}: {}", message.sender, message.text),
            Self::Raw(RawPayload::Text(text)) => f.write_str(text),
            Self::Raw(RawPayload::Binary(bytes)) => write!(f, "(binary {} bytes)", bytes.len()),
        }
    }
}

/// Message codec trait for converting between text and transport frames.
///
/// Decoding never fails: anything that does not fit the structured form is degraded to an
/// [`InboundMessage::Raw`] rather than dropped.
///
/// - Chat: [`EnvelopeCodec`], JSON envelope with message and sender
/// - Notifications: [`PlainTextCodec`], text as-is
pub trait MessageCodec: Send + Sync + 'static {
    /// Encode outbound text into a frame.
    fn encode(&self, text: &str) -> Result<Frame>;

    /// Decode an inbound frame.
    fn decode(&self, frame: Frame) -> InboundMessage;
}

#[derive(Deserialize)]
struct InboundEnvelope {
    message: String,
    username: String,
}

#[derive(Serialize)]
struct OutboundEnvelope<'msg> {
    message: &'msg str,
    username: &'msg str,
}

/// JSON envelope codec: `{"message": "...", "username": "..."}`.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    sender: String,
}

impl EnvelopeCodec {
    /// Codec that stamps every outbound message with `sender`.
    #[must_use]
    pub fn new<S: Into<String>>(sender: S) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    fn decode_text(text: String) -> InboundMessage {
        match serde_json::from_str::<InboundEnvelope>(&text) {
            Ok(envelope) => InboundMessage::Chat(ChatMessage {
                text: envelope.message,
                sender: envelope.username,
            }),
            #[cfg_attr(
                not(feature = "tracing"),
                expect(unused_variables, reason = "Only logged when tracing is enabled")
            )]
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(%text, error = %e, "Not an envelope, delivering raw text");
                InboundMessage::Raw(RawPayload::Text(text))
            }
        }
    }
}

impl MessageCodec for EnvelopeCodec {
    fn encode(&self, text: &str) -> Result<Frame> {
        let envelope = OutboundEnvelope {
            message: text,
            username: &self.sender,
        };
        Ok(Frame::Text(serde_json::to_string(&envelope)?))
    }

    fn decode(&self, frame: Frame) -> InboundMessage {
        match text_or_binary(frame) {
            Ok(text) => Self::decode_text(text),
            Err(bytes) => InboundMessage::Raw(RawPayload::Binary(bytes)),
        }
    }
}

/// Plain text codec: frames carry the text itself.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl MessageCodec for PlainTextCodec {
    fn encode(&self, text: &str) -> Result<Frame> {
        Ok(Frame::Text(text.to_owned()))
    }

    fn decode(&self, frame: Frame) -> InboundMessage {
        match text_or_binary(frame) {
            Ok(text) => InboundMessage::Raw(RawPayload::Text(text)),
            Err(bytes) => InboundMessage::Raw(RawPayload::Binary(bytes)),
        }
    }
}

/// Text frames as-is, binary frames as text when they are valid UTF-8.
fn text_or_binary(frame: Frame) -> std::result::Result<String, Vec<u8>> {
    match frame {
        Frame::Text(text) => Ok(text),
        Frame::Binary(bytes) => String::from_utf8(bytes).map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::trace!(error = %e, "Binary frame is not UTF-8");
            e.into_bytes()
        }),
    }
}
