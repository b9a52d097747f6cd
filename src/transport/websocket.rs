use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use super::error::{GOING_AWAY, NO_STATUS_RECEIVED, TransportError};
use super::{Command, Frame, Link, Peer, Transport, pair};
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tungstenite-backed [`Transport`].
///
/// Each opened connection is owned by a spawned driver task. Probes are WebSocket PING frames
/// answered by the peer's PONG; configured headers ride on the HTTP upgrade request.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &Url, headers: &[(String, String)]) -> Result<Link> {
        let mut request = endpoint.as_str().into_client_request()?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::validation(format!("invalid header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::validation(format!("invalid value for header `{name}`: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, _) = connect_async(request).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(%endpoint, "WebSocket handshake completed");

        let (link, peer) = pair();
        tokio::spawn(drive(ws_stream, peer));

        Ok(link)
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

/// Own one WebSocket connection until it fails, is closed, or every handle is dropped.
///
/// Whatever ends the connection is reported last on the frame channel, so frames read before
/// it are delivered first. Pending probes are dropped on exit.
async fn drive(ws_stream: WsStream, mut peer: Peer) {
    let (mut write, mut read) = ws_stream.split();
    // Tungstenite answers pings itself; pongs come back in order, one per probe.
    let mut pending_pings: VecDeque<oneshot::Sender<Result<()>>> = VecDeque::new();

    loop {
        tokio::select! {
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(%text, "Received WebSocket text frame");

                        if peer.frames.send(Ok(Frame::Text(text.to_string()))).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(len = bytes.len(), "Received WebSocket binary frame");

                        if peer.frames.send(Ok(Frame::Binary(bytes.to_vec()))).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(ack) = pending_pings.pop_front() {
                            _ = ack.send(Ok(()));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (NO_STATUS_RECEIVED, String::new()),
                            |f| (u16::from(f.code), f.reason.to_string()),
                        );
                        _ = peer.frames.send(Err(TransportError::Closed { code, reason }.into()));
                        break;
                    }
                    Some(Ok(_)) => {
                        // PING frames are answered by tungstenite; raw frames are not surfaced.
                    }
                    Some(Err(e)) => {
                        _ = peer.frames.send(Err(e.into()));
                        break;
                    }
                    None => {
                        _ = peer.frames.send(Err(TransportError::LinkDropped.into()));
                        break;
                    }
                }
            }

            command = peer.commands.recv() => {
                match command {
                    Some(Command::Send { frame, ack }) => {
                        let result = write.send(frame.into()).await.map_err(Error::from);
                        _ = ack.send(result);
                    }
                    Some(Command::Ping { ack }) => {
                        if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                            // Queued behind any frames already read; the dropped ack tells the
                            // heartbeat to leave the report to the receive loop.
                            _ = peer.frames.send(Err(e.into()));
                            drop(ack);
                            break;
                        }
                        pending_pings.push_back(ack);
                    }
                    Some(Command::Close { code, reason }) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        _ = write.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    None => {
                        let frame = CloseFrame {
                            code: CloseCode::from(GOING_AWAY),
                            reason: "session dropped".into(),
                        };
                        _ = write.send(Message::Close(Some(frame))).await;
                        break;
                    }
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        unanswered_probes = pending_pings.len(),
        "WebSocket driver stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn frames_map_to_messages() {
        assert_eq!(
            Message::from(Frame::Text("hi".to_owned())),
            Message::Text("hi".into())
        );
        assert_eq!(
            Message::from(Frame::Binary(vec![1, 2, 3])),
            Message::Binary(vec![1, 2, 3].into())
        );
    }

    #[tokio::test]
    async fn invalid_header_name_is_a_validation_error() {
        let endpoint = Url::parse("ws://127.0.0.1:9/").unwrap();
        let headers = [("bad header".to_owned(), "value".to_owned())];

        let err = WsTransport.open(&endpoint, &headers).await.unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }
}
