//! Resilient session over a persistent WebSocket connection.
//!
//! A [`Session`] owns the connection state machine. While a connection instance is live it
//! runs a heartbeat and a receive loop against it; failures from either (or from the
//! handshake) feed one failure handler that reconnects with exponential backoff or ends the
//! lifecycle in [`ConnectionState::Failed`]. State changes and inbound messages reach the
//! [`SessionObserver`] in order, from a single dispatcher task.
//!
//! # Architecture
//!
//! - [`Session`]: public handle, owns the controller
//! - `heartbeat`: per-instance liveness probing
//! - `receiver`: per-instance receive loop
//! - [`observer`]: event delivery
//!
//! Every connection instance is tagged with a generation. Callbacks carry the generation they
//! were started with and are dropped when it is no longer current, so nothing from a
//! torn-down instance can change state or deliver messages.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ws_session::{ChannelObserver, EnvelopeCodec, Session, SessionConfig};
//!
//! # async fn example() -> ws_session::Result<()> {
//! let (observer, mut events) = ChannelObserver::new();
//! let session = Session::new(EnvelopeCodec::new("alice"), Arc::new(observer));
//!
//! session.start(
//!     SessionConfig::builder()
//!         .endpoint("wss://chat.example.com/ws")
//!         .build(),
//! )?;
//! session.send("hello").await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![expect(
    clippy::module_name_repetitions,
    reason = "Session types expose their domain in the name for clarity"
)]

mod heartbeat;
pub mod observer;
mod receiver;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use url::Url;

pub use observer::{ChannelObserver, SessionEvent, SessionObserver};

use crate::codec::MessageCodec;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::state::ConnectionState;
use crate::transport::{
    Frame, GOING_AWAY, Link, LinkHandle, NORMAL_CLOSURE, Transport, TransportError, WsTransport,
};
use crate::{Error, Result};

/// Generation tag and cancellation scope of one connection instance.
#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub(crate) generation: u64,
    pub(crate) token: CancellationToken,
}

/// Callbacks from per-instance activities into the controller.
pub(crate) trait Supervisor: Send + Sync + 'static {
    /// A probe was answered. Returns `false` once `generation` is no longer current.
    fn on_alive(&self, generation: u64) -> bool;

    /// A frame arrived. Returns `false` once `generation` is no longer current.
    fn on_frame(&self, generation: u64, frame: Frame) -> bool;

    /// The instance failed. Ignored unless `generation` is current and the session is active.
    fn on_failure(self: &Arc<Self>, generation: u64, error: Error);
}

/// Endpoint and settings of the current lifecycle.
#[derive(Debug)]
struct Target {
    url: Url,
    config: SessionConfig,
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    attempt: u32,
    generation: u64,
    target: Option<Arc<Target>>,
    link: Option<LinkHandle>,
    /// Cancelled by `stop()` and terminal states; parent of every instance token
    lifecycle: Option<CancellationToken>,
    instance: Option<CancellationToken>,
}

impl Inner {
    fn advance(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state.is_active()
    }

    /// Stop the live instance's activities and close its transport.
    fn release(&mut self, code: u16, reason: &str) {
        if let Some(token) = self.instance.take() {
            token.cancel();
        }
        if let Some(link) = self.link.take() {
            link.close(code, reason);
        }
    }

    fn end_lifecycle(&mut self) {
        if let Some(token) = self.lifecycle.take() {
            token.cancel();
        }
    }
}

struct Controller<C, T> {
    transport: T,
    codec: C,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    root: CancellationToken,
}

impl<C: MessageCodec, T: Transport> Controller<C, T> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation below leaves `Inner` consistent before it can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        _ = self.events.send(event);
    }

    /// Move to `next` and publish it. Must be called with the lock held.
    fn transition(&self, inner: &mut Inner, next: ConnectionState) {
        if inner.state == next {
            return;
        }
        if matches!(
            next,
            ConnectionState::Connected | ConnectionState::Closed(_)
        ) {
            inner.attempt = 0;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = %inner.state,
            to = %next,
            generation = inner.generation,
            "Session state changed"
        );

        inner.state = next.clone();
        self.state_tx.send_replace(next.clone());
        self.publish(SessionEvent::StateChanged(next));
    }

    fn start(self: &Arc<Self>, config: SessionConfig) -> Result<()> {
        let url = config.endpoint_url()?;

        let generation = {
            let mut inner = self.lock();
            if inner.state.is_active() {
                #[cfg(feature = "tracing")]
                tracing::debug!(state = %inner.state, "Session already active, ignoring start");
                return Ok(());
            }

            inner.attempt = 0;
            inner.end_lifecycle();
            inner.lifecycle = Some(self.root.child_token());
            inner.target = Some(Arc::new(Target { url, config }));
            let generation = inner.advance();
            self.transition(&mut inner, ConnectionState::Connecting);
            generation
        };

        tokio::spawn(Arc::clone(self).connect(generation));

        Ok(())
    }

    /// Open a transport for `generation` and start its activities.
    async fn connect(self: Arc<Self>, generation: u64) {
        let (target, lifecycle) = {
            let mut inner = self.lock();
            if !inner.is_current(generation) {
                return;
            }
            let (Some(target), Some(lifecycle)) = (inner.target.clone(), inner.lifecycle.clone())
            else {
                return;
            };

            let pending = match inner.attempt {
                0 => ConnectionState::Connecting,
                attempt => ConnectionState::Reconnecting { attempt },
            };
            self.transition(&mut inner, pending);
            (target, lifecycle)
        };

        let connect_timeout = target.config.connect_timeout;
        let opened = tokio::select! {
            biased;
            () = lifecycle.cancelled() => return,
            opened = timeout(
                connect_timeout,
                self.transport.open(&target.url, &target.config.headers),
            ) => opened,
        };

        match opened {
            Ok(Ok(link)) => self.attach(generation, link, &target),
            Ok(Err(e)) => self.on_failure(generation, e),
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    generation,
                    "Handshake did not complete within {connect_timeout:?}"
                );

                self.on_failure(
                    generation,
                    TransportError::HandshakeTimeout(connect_timeout).into(),
                );
            }
        }
    }

    /// Install a freshly opened link as the live instance, unless it was superseded while the
    /// handshake was in flight.
    fn attach(self: &Arc<Self>, generation: u64, link: Link, target: &Target) {
        let (handle, frames) = link.into_parts();

        let instance = {
            let mut inner = self.lock();
            let lifecycle = inner
                .lifecycle
                .clone()
                .filter(|_| inner.is_current(generation));
            let Some(lifecycle) = lifecycle else {
                drop(inner);
                handle.close(GOING_AWAY, "superseded");
                return;
            };

            let token = lifecycle.child_token();
            inner.instance = Some(token.clone());
            inner.link = Some(handle.clone());
            Instance { generation, token }
        };

        tokio::spawn(heartbeat::run(
            Arc::clone(self),
            instance.clone(),
            handle,
            target.config.heartbeat_interval,
            target.config.heartbeat_timeout,
        ));
        tokio::spawn(receiver::run(Arc::clone(self), instance, frames));
    }

    /// Mark the instance alive. Caller holds the lock and has checked the generation.
    fn mark_alive(&self, inner: &mut Inner) {
        if inner.state.is_pending() {
            self.transition(inner, ConnectionState::Connected);
        }
    }

    fn stop(&self) {
        let mut inner = self.lock();

        #[cfg(feature = "tracing")]
        tracing::debug!(state = %inner.state, "Stopping session");

        inner.advance();
        inner.end_lifecycle();
        inner.release(NORMAL_CLOSURE, "stopped");
        self.transition(&mut inner, ConnectionState::Closed(None));
    }

    async fn send(&self, text: &str) -> Result<()> {
        let link = self.lock().link.clone();

        let result = match link {
            Some(link) => match self.codec.encode(text) {
                Ok(frame) => link.send(frame).await,
                Err(e) => Err(e),
            },
            None => Err(Error::not_connected()),
        };

        if let Err(e) = &result {
            let record = SessionError::from(e);

            #[cfg(feature = "tracing")]
            tracing::warn!(error = %record, "Send failed");

            self.publish(SessionEvent::SendFailed(record));
        }

        result
    }

    /// Tear everything down without publishing; used when the owning [`Session`] is dropped.
    fn shutdown(&self) {
        self.root.cancel();

        let mut inner = self.lock();
        inner.advance();
        inner.end_lifecycle();
        inner.release(GOING_AWAY, "session dropped");
    }
}

impl<C: MessageCodec, T: Transport> Supervisor for Controller<C, T> {
    fn on_alive(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            return false;
        }
        self.mark_alive(&mut inner);
        true
    }

    fn on_frame(&self, generation: u64, frame: Frame) -> bool {
        let message = self.codec.decode(frame);

        let mut inner = self.lock();
        if !inner.is_current(generation) {
            #[cfg(feature = "tracing")]
            tracing::trace!(generation, "Dropping frame from superseded connection");
            return false;
        }
        self.mark_alive(&mut inner);
        self.publish(SessionEvent::Message(message));
        true
    }

    fn on_failure(self: &Arc<Self>, generation: u64, error: Error) {
        let record = SessionError::from(&error);

        let mut inner = self.lock();
        if !inner.is_current(generation) {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                generation,
                current = inner.generation,
                error = %record,
                "Ignoring failure from superseded connection"
            );
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(generation, state = %inner.state, error = %record, "Connection failed");

        self.publish(SessionEvent::TransportError(record.clone()));
        inner.release(GOING_AWAY, "reconnecting");
        let next_generation = inner.advance();

        if error.is_normal_close() {
            inner.end_lifecycle();
            self.transition(&mut inner, ConnectionState::Closed(Some(record)));
            return;
        }

        let (Some(target), Some(lifecycle)) = (inner.target.clone(), inner.lifecycle.clone())
        else {
            return;
        };

        if target.config.reconnect.is_exhausted(inner.attempt) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempts = inner.attempt,
                "Reconnection attempts exhausted, giving up"
            );

            inner.end_lifecycle();
            self.transition(&mut inner, ConnectionState::Failed(record));
            return;
        }

        inner.attempt = inner.attempt.saturating_add(1);
        let attempt = inner.attempt;
        self.transition(&mut inner, ConnectionState::Reconnecting { attempt });
        drop(inner);

        let delay = target.config.reconnect.delay(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt, ?delay, "Scheduling reconnect");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = lifecycle.cancelled() => {}
                () = sleep(delay) => this.connect(next_generation).await,
            }
        });
    }
}

/// Resilient WebSocket session.
///
/// Created once per logical client. [`Session::start`] begins a connection lifecycle,
/// [`Session::stop`] ends it, and `start` may then be called again for a fresh lifecycle.
/// Constructing a session spawns its event dispatcher, so it must happen inside a Tokio
/// runtime. Dropping the session cancels all of its background activity and closes the live
/// connection.
///
/// # Type Parameters
///
/// - `C`: codec that implements [`MessageCodec`]
/// - `T`: transport that implements [`Transport`], [`WsTransport`] by default
pub struct Session<C: MessageCodec, T: Transport = WsTransport> {
    controller: Arc<Controller<C, T>>,
}

impl<C: MessageCodec> Session<C> {
    /// Create a session over real WebSocket connections.
    #[must_use]
    pub fn new(codec: C, observer: Arc<dyn SessionObserver>) -> Self {
        Self::with_transport(WsTransport::default(), codec, observer)
    }
}

impl<C: MessageCodec, T: Transport> Session<C, T> {
    /// Create a session over a custom transport.
    #[must_use]
    pub fn with_transport(transport: T, codec: C, observer: Arc<dyn SessionObserver>) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        observer::spawn_dispatcher(observer, events_rx);
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            controller: Arc::new(Controller {
                transport,
                codec,
                inner: Mutex::new(Inner::default()),
                state_tx,
                events,
                root: CancellationToken::new(),
            }),
        }
    }

    /// Begin a connection lifecycle with `config`.
    ///
    /// Does nothing while a connection is being established or is live, so repeated calls
    /// never create a second connection. Returns an error, without changing state, if the
    /// configuration is invalid.
    pub fn start(&self, config: SessionConfig) -> Result<()> {
        self.controller.start(config)
    }

    /// Cancel any pending reconnect, close the live connection and move to
    /// [`ConnectionState::Closed`] with no error. Safe to call in any state.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Encode `text` with the session's codec and send it on the live connection.
    ///
    /// Failures, including having no live connection, are returned and reported to the
    /// observer through [`SessionObserver::on_send_failed`]; they never change the connection
    /// state or trigger a reconnect.
    pub async fn send(&self, text: &str) -> Result<()> {
        self.controller.send(text).await
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.controller.lock().state.clone()
    }

    /// Reconnection attempts made since the session was last connected.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.controller.lock().attempt
    }

    /// Subscribe to connection state changes.
    ///
    /// The receiver always holds the latest state; intermediate states may be skipped by a
    /// slow reader. Use a [`SessionObserver`] to see every transition.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.controller.state_tx.subscribe()
    }
}

impl<C: MessageCodec, T: Transport> Drop for Session<C, T> {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}
