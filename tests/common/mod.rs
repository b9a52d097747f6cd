#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of the helpers"
)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;
use ws_session::transport::{Command, Link, Peer, TransportError, pair};
use ws_session::{ConnectionState, Frame, Result, SessionConfig, SessionEvent, Transport};

pub const ENDPOINT: &str = "ws://mock.test/chat";

/// How the mock answers liveness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pings {
    Answer,
    Fail,
    Ignore,
}

struct Shared {
    opens: AtomicUsize,
    refuse: AtomicBool,
    stall: AtomicBool,
    fail_sends: AtomicBool,
    pings: Mutex<Pings>,
    handshakes: Mutex<Vec<Vec<(String, String)>>>,
    closes: Mutex<Vec<(u16, String)>>,
    connections: mpsc::UnboundedSender<MockConnection>,
}

/// In-memory [`Transport`] whose behavior the test scripts.
///
/// Clones share state, so a test keeps one clone and hands another to the session.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Server side of one opened connection.
///
/// Dropping it ends the connection as if the socket vanished. Either way the connection ends,
/// its driver stops and drops any probe it was still holding, as the WebSocket driver does.
pub struct MockConnection {
    frames: mpsc::UnboundedSender<Result<Frame>>,
    pub sent: mpsc::UnboundedReceiver<Frame>,
    ended: CancellationToken,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.ended.cancel();
    }
}

impl MockConnection {
    pub fn push_text(&self, text: &str) {
        self.frames.send(Ok(Frame::Text(text.to_owned()))).unwrap();
    }

    pub fn push_binary(&self, bytes: &[u8]) {
        self.frames.send(Ok(Frame::Binary(bytes.to_vec()))).unwrap();
    }

    /// Deliver a close frame from the server and stop the driver.
    pub fn close(&self, code: u16, reason: &str) {
        self.frames
            .send(Err(TransportError::Closed {
                code,
                reason: reason.to_owned(),
            }
            .into()))
            .unwrap();
        self.ended.cancel();
    }

    pub async fn next_sent(&mut self) -> Frame {
        timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .unwrap()
            .unwrap()
    }
}

impl MockTransport {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockConnection>) {
        let (connections, rx) = mpsc::unbounded_channel();
        let transport = Self {
            shared: Arc::new(Shared {
                opens: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                stall: AtomicBool::new(false),
                fail_sends: AtomicBool::new(false),
                pings: Mutex::new(Pings::Answer),
                handshakes: Mutex::new(Vec::new()),
                closes: Mutex::new(Vec::new()),
                connections,
            }),
        };
        (transport, rx)
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Leave every following handshake pending forever.
    pub fn stall(&self, stall: bool) {
        self.shared.stall.store(stall, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn pings(&self, pings: Pings) {
        *self.shared.pings.lock().unwrap() = pings;
    }

    pub fn handshakes(&self) -> Vec<Vec<(String, String)>> {
        self.shared.handshakes.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.shared.closes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _endpoint: &Url, headers: &[(String, String)]) -> Result<Link> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        self.shared
            .handshakes
            .lock()
            .unwrap()
            .push(headers.to_vec());

        if self.shared.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.shared.refuse.load(Ordering::SeqCst) {
            let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
            return Err(TransportError::Connection(tungstenite::Error::Io(refused)).into());
        }

        let (link, peer) = pair();
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let Peer {
            commands, frames, ..
        } = peer;

        let ended = CancellationToken::new();
        tokio::spawn(serve(
            Arc::clone(&self.shared),
            commands,
            sent_tx,
            ended.clone(),
        ));
        _ = self.shared.connections.send(MockConnection {
            frames,
            sent,
            ended,
        });

        Ok(link)
    }
}

async fn serve(
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    sent: mpsc::UnboundedSender<Frame>,
    ended: CancellationToken,
) {
    // Acks for ignored probes stay alive until the connection ends.
    let mut held: Vec<oneshot::Sender<Result<()>>> = Vec::new();

    loop {
        let command = tokio::select! {
            biased;
            () = ended.cancelled() => break,
            command = commands.recv() => command,
        };
        let Some(command) = command else {
            break;
        };

        match command {
            Command::Ping { ack } => {
                let policy = *shared.pings.lock().unwrap();
                match policy {
                    Pings::Answer => {
                        _ = ack.send(Ok(()));
                    }
                    Pings::Fail => {
                        let error = tungstenite::Error::AlreadyClosed;
                        _ = ack.send(Err(TransportError::Connection(error).into()));
                    }
                    Pings::Ignore => held.push(ack),
                }
            }
            Command::Send { frame, ack } => {
                if shared.fail_sends.load(Ordering::SeqCst) {
                    let error = tungstenite::Error::AlreadyClosed;
                    _ = ack.send(Err(TransportError::Connection(error).into()));
                } else {
                    _ = sent.send(frame);
                    _ = ack.send(Ok(()));
                }
            }
            Command::Close { code, reason } => {
                shared.closes.lock().unwrap().push((code, reason));
                break;
            }
            _ => {}
        }
    }
}

#[must_use]
pub fn config() -> SessionConfig {
    SessionConfig::builder().endpoint(ENDPOINT).build()
}

pub async fn next_connection(
    connections: &mut mpsc::UnboundedReceiver<MockConnection>,
) -> MockConnection {
    timeout(Duration::from_secs(60), connections.recv())
        .await
        .unwrap()
        .unwrap()
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(60), events.recv())
        .await
        .unwrap()
        .unwrap()
}

/// Skip events until `state` is reported, returning the skipped events.
pub async fn wait_for_state(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    state: &ConnectionState,
) -> Vec<SessionEvent> {
    let mut skipped = Vec::new();
    loop {
        match next_event(events).await {
            SessionEvent::StateChanged(current) if current == *state => return skipped,
            other => skipped.push(other),
        }
    }
}

/// Collect only the state changes among `events`.
#[must_use]
pub fn states(events: &[SessionEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect()
}

/// Drain whatever has already been delivered.
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}
