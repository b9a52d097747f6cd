//! Interactive chat client over a resilient session.
//!
//! This example shows how to:
//! 1. Implement a [`SessionObserver`] that logs state changes and messages
//! 2. Attach handshake headers naming the room and display name
//! 3. Send every line typed on stdin as a chat envelope
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,ws_session=debug cargo run --example chat --features tracing -- wss://chat.example.com/ws alice lobby
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{error, info, warn};
use ws_session::{
    ConnectionState, EnvelopeCodec, InboundMessage, Session, SessionConfig, SessionError,
    SessionObserver,
};

struct ChatLog;

impl SessionObserver for ChatLog {
    fn on_state_changed(&self, state: &ConnectionState) {
        match state {
            ConnectionState::Failed(e) => error!(state = %state, code = e.code, "giving up"),
            _ => info!(state = %state),
        }
    }

    fn on_message(&self, message: &InboundMessage) {
        match message {
            InboundMessage::Chat(chat) => info!(sender = %chat.sender, "{}", chat.text),
            _ => info!(raw = %message),
        }
    }

    fn on_send_failed(&self, error: &SessionError) {
        warn!(error = %error, "message not sent");
    }

    fn on_transport_error(&self, error: &SessionError) {
        warn!(error = %error, "connection problem");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| "ws://127.0.0.1:9000/chat".to_owned());
    let username = args.next().unwrap_or_else(|| "guest".to_owned());
    let room = args.next().unwrap_or_else(|| "lobby".to_owned());

    let session = Session::new(EnvelopeCodec::new(username.clone()), Arc::new(ChatLog));
    session.start(
        SessionConfig::builder()
            .endpoint(endpoint)
            .headers(vec![
                ("X-Room".to_owned(), room),
                ("X-Display-Name".to_owned(), username),
            ])
            .build(),
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        // Failures are already reported through the observer.
        _ = session.send(line).await;
    }

    session.stop();
    Ok(())
}
