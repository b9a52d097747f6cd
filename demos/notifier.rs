//! Plain-text notification listener.
//!
//! Subscribes to a server that pushes short text notifications and logs each one until the
//! session ends. Uses the [`ChannelObserver`] to consume events as a stream.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example notifier --features tracing -- wss://events.example.com/ws
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use ws_session::{
    ChannelObserver, PlainTextCodec, ReconnectConfig, Session, SessionConfig, SessionEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9000/events".to_owned());

    let mut reconnect = ReconnectConfig::default();
    reconnect.max_attempts = None;
    reconnect.max_backoff = Duration::from_secs(30);

    let (observer, mut events) = ChannelObserver::new();
    let session = Session::new(PlainTextCodec::default(), Arc::new(observer));
    session.start(
        SessionConfig::builder()
            .endpoint(endpoint)
            .heartbeat_interval(Duration::from_secs(30))
            .reconnect(reconnect)
            .build(),
    )?;

    let mut received = 0_usize;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Message(message) => {
                received += 1;
                info!(notification = %message, received);
            }
            SessionEvent::StateChanged(state) => {
                info!(state = %state, attempt = session.attempt());
                if state.is_terminal() {
                    break;
                }
            }
            SessionEvent::TransportError(error) => warn!(error = %error),
            other => warn!(event = ?other),
        }
    }

    info!(received, "notifier finished");
    Ok(())
}
