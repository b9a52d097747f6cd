use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use super::{Instance, Supervisor};
use crate::transport::{LinkHandle, TransportError};

/// Probe `link` immediately, then every `interval`, until the instance is torn down.
///
/// A probe without an answer within `probe_timeout`, or one that errors, is handed to the
/// supervisor's failure handler and ends the loop for this instance. A probe that fails
/// because the driver went away ends the loop quietly: the receive loop reports how the
/// connection ended once it has drained the frames queued ahead of it.
pub(crate) async fn run<S: Supervisor>(
    supervisor: Arc<S>,
    instance: Instance,
    link: LinkHandle,
    interval: Duration,
    probe_timeout: Duration,
) {
    loop {
        let probe = tokio::select! {
            biased;
            () = instance.token.cancelled() => break,
            result = timeout(probe_timeout, link.ping()) => result,
        };

        match probe {
            Ok(Ok(())) => {
                if !supervisor.on_alive(instance.generation) {
                    break;
                }
            }
            Ok(Err(e))
                if matches!(
                    e.downcast_ref::<TransportError>(),
                    Some(TransportError::LinkDropped)
                ) =>
            {
                break;
            }
            Ok(Err(e)) => {
                supervisor.on_failure(instance.generation, e);
                break;
            }
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    generation = instance.generation,
                    "Heartbeat timeout: no pong received within {probe_timeout:?}"
                );
                supervisor.on_failure(
                    instance.generation,
                    TransportError::HeartbeatTimeout(probe_timeout).into(),
                );
                break;
            }
        }

        tokio::select! {
            biased;
            () = instance.token.cancelled() => break,
            () = sleep(interval) => {}
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(generation = instance.generation, "Heartbeat stopped");
}
