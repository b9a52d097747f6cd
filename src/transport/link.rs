use tokio::sync::{mpsc, oneshot};

use super::Frame;
use super::error::TransportError;
use crate::Result;

/// Request from a [`LinkHandle`] to the connection driver.
#[non_exhaustive]
#[derive(Debug)]
pub enum Command {
    /// Write `frame`, then report the outcome on `ack`
    Send {
        frame: Frame,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Send a liveness probe and resolve `ack` once the peer answers
    Ping { ack: oneshot::Sender<Result<()>> },
    /// Close the connection with a close frame and stop the driver
    Close { code: u16, reason: String },
}

/// Write side of a connection instance.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl LinkHandle {
    /// Write a frame and wait for the driver to report the outcome.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, ack })
            .map_err(|_e| TransportError::LinkDropped)?;
        rx.await.map_err(|_e| TransportError::LinkDropped)?
    }

    /// Send a liveness probe and wait for the peer's answer.
    pub async fn ping(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::Ping { ack })
            .map_err(|_e| TransportError::LinkDropped)?;
        rx.await.map_err(|_e| TransportError::LinkDropped)?
    }

    /// Ask the driver to close the connection. Best effort: a driver that is already gone
    /// is ignored.
    pub fn close(&self, code: u16, reason: &str) {
        _ = self.commands.send(Command::Close {
            code,
            reason: reason.to_owned(),
        });
    }

    /// Whether the driver has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Read side of a connection instance.
#[derive(Debug)]
pub struct FrameReceiver {
    frames: mpsc::UnboundedReceiver<Result<Frame>>,
}

impl FrameReceiver {
    /// Next inbound frame. `None` once the driver has gone away.
    pub async fn next(&mut self) -> Option<Result<Frame>> {
        self.frames.recv().await
    }
}

/// Both halves of a freshly opened connection instance.
#[derive(Debug)]
pub struct Link {
    handle: LinkHandle,
    frames: FrameReceiver,
}

impl Link {
    #[must_use]
    pub fn into_parts(self) -> (LinkHandle, FrameReceiver) {
        (self.handle, self.frames)
    }
}

/// Driver side of a [`Link`].
///
/// The driver reads [`Command`]s and reports inbound frames (or the error that ended the
/// connection) on `frames`.
#[non_exhaustive]
#[derive(Debug)]
pub struct Peer {
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub frames: mpsc::UnboundedSender<Result<Frame>>,
}

/// Create an in-memory link and the driver side that services it.
#[must_use]
pub fn pair() -> (Link, Peer) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();

    let link = Link {
        handle: LinkHandle {
            commands: command_tx,
        },
        frames: FrameReceiver { frames: frame_rx },
    };
    let peer = Peer {
        commands: command_rx,
        frames: frame_tx,
    };

    (link, peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[tokio::test]
    async fn send_resolves_with_driver_ack() {
        let (link, mut peer) = pair();
        let (handle, _frames) = link.into_parts();

        tokio::spawn(async move {
            if let Some(Command::Send { frame, ack }) = peer.commands.recv().await {
                assert_eq!(frame, Frame::Text("hello".to_owned()));
                _ = ack.send(Ok(()));
            }
        });

        handle.send(Frame::Text("hello".to_owned())).await.unwrap();
    }

    #[tokio::test]
    async fn ping_fails_when_driver_drops_ack() {
        let (link, mut peer) = pair();
        let (handle, _frames) = link.into_parts();

        tokio::spawn(async move {
            // Receive the probe and drop it unanswered.
            drop(peer.commands.recv().await);
        });

        let err = handle.ping().await.unwrap_err();
        assert_eq!(err.kind(), Kind::Transport);
        assert!(matches!(
            err.downcast_ref::<TransportError>(),
            Some(TransportError::LinkDropped)
        ));
    }

    #[tokio::test]
    async fn close_after_driver_exit_is_ignored() {
        let (link, peer) = pair();
        let (handle, mut frames) = link.into_parts();
        drop(peer);

        handle.close(1000, "bye");
        assert!(handle.is_closed());
        assert!(frames.next().await.is_none());
    }
}
