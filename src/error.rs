#![expect(
    clippy::module_name_repetitions,
    reason = "SessionError is the name callers see on states and events"
)]

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::transport::TransportError;

/// Code used in a [`SessionError`] when the failure carries no more specific code.
pub const UNSPECIFIED_CODE: i64 = -1;

#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Kind {
    /// Failure opening, writing to, reading from, or probing the transport
    Transport,
    /// Failure encoding an outbound message
    Codec,
    /// Invalid configuration or input supplied by the caller
    Validation,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    /// The error reported when sending without a live connection.
    #[must_use]
    pub fn not_connected() -> Self {
        TransportError::NotConnected.into()
    }

    /// Whether this error is the peer closing the connection with a normal-closure code.
    #[must_use]
    pub fn is_normal_close(&self) -> bool {
        self.downcast_ref::<TransportError>()
            .is_some_and(TransportError::is_normal_close)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Codec, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

/// Normalized, cloneable view of an [`Error`].
///
/// Connection states and observer events carry this record instead of [`Error`] itself so
/// they can be cloned, compared and handed to several consumers. `code` is the WebSocket close
/// code for close frames, the HTTP status for a rejected handshake, the OS error number for
/// I/O failures, and a negative value otherwise.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionError {
    pub domain: Kind,
    pub code: i64,
    pub message: String,
}

impl SessionError {
    #[must_use]
    pub fn new<S: Into<String>>(domain: Kind, code: i64, message: S) -> Self {
        Self {
            domain,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error {}: {}", self.domain, self.code, self.message)
    }
}

impl From<&Error> for SessionError {
    fn from(e: &Error) -> Self {
        let code = e
            .downcast_ref::<TransportError>()
            .map_or(UNSPECIFIED_CODE, TransportError::code);
        let message = e
            .inner()
            .map_or_else(|| e.kind().to_string(), ToString::to_string);

        Self::new(e.kind(), code, message)
    }
}

impl From<Error> for SessionError {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}
