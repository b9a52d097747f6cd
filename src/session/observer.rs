use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::InboundMessage;
use crate::error::SessionError;
use crate::state::ConnectionState;

/// Receives session events.
///
/// All calls for one [`crate::Session`] come from a single dispatcher task, in the order the
/// controller produced them, so implementations never see interleaved or reordered events.
/// Calls should return quickly; slow work belongs on the implementor's own task.
pub trait SessionObserver: Send + Sync + 'static {
    fn on_state_changed(&self, state: &ConnectionState);

    fn on_message(&self, message: &InboundMessage);

    /// A `send` call failed. The connection state is not affected.
    fn on_send_failed(&self, error: &SessionError) {
        let _ = error;
    }

    /// A transport, heartbeat, or receive failure was accepted by the controller. Reported
    /// before the resulting transition.
    fn on_transport_error(&self, error: &SessionError) {
        let _ = error;
    }
}

/// Everything a [`SessionObserver`] can be told, as a value.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    Message(InboundMessage),
    SendFailed(SessionError),
    TransportError(SessionError),
}

impl SessionEvent {
    fn deliver(&self, observer: &dyn SessionObserver) {
        match self {
            Self::StateChanged(state) => observer.on_state_changed(state),
            Self::Message(message) => observer.on_message(message),
            Self::SendFailed(error) => observer.on_send_failed(error),
            Self::TransportError(error) => observer.on_transport_error(error),
        }
    }
}

/// Observer that forwards every event into an unbounded channel.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ws_session::{ChannelObserver, PlainTextCodec, Session, SessionEvent};
///
/// # async fn example() {
/// let (observer, mut events) = ChannelObserver::new();
/// let session = Session::new(PlainTextCodec::default(), Arc::new(observer));
///
/// while let Some(event) = events.recv().await {
///     if let SessionEvent::Message(message) = event {
///         println!("{message}");
///     }
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        // Nobody listening is not an error for the session.
        _ = self.events.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_state_changed(&self, state: &ConnectionState) {
        self.forward(SessionEvent::StateChanged(state.clone()));
    }

    fn on_message(&self, message: &InboundMessage) {
        self.forward(SessionEvent::Message(message.clone()));
    }

    fn on_send_failed(&self, error: &SessionError) {
        self.forward(SessionEvent::SendFailed(error.clone()));
    }

    fn on_transport_error(&self, error: &SessionError) {
        self.forward(SessionEvent::TransportError(error.clone()));
    }
}

/// Spawn the single delivery context for a session's events.
///
/// The task ends once every sender of `events` is gone.
pub(crate) fn spawn_dispatcher(
    observer: Arc<dyn SessionObserver>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            event.deliver(observer.as_ref());
        }
    });
}
