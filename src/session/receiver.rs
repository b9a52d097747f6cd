use std::sync::Arc;

use super::{Instance, Supervisor};
use crate::transport::{FrameReceiver, TransportError};

/// Pull frames until the connection fails, the instance is torn down, or the supervisor
/// reports the instance as superseded.
pub(crate) async fn run<S: Supervisor>(
    supervisor: Arc<S>,
    instance: Instance,
    mut frames: FrameReceiver,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = instance.token.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                if !supervisor.on_frame(instance.generation, frame) {
                    break;
                }
            }
            Some(Err(e)) => {
                supervisor.on_failure(instance.generation, e);
                break;
            }
            None => {
                supervisor.on_failure(instance.generation, TransportError::LinkDropped.into());
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(generation = instance.generation, "Receive loop stopped");
}
