//! # Non-blocking delivery to one listener.
//!
//! [`QueuedChannel`] puts a bounded queue and a dedicated worker in front of a
//! [`PushChannel`], so the dispatcher never waits on a listener's transport.
//!
//! ## Architecture
//! ```text
//! Dispatcher::on_event()
//!     │ enqueue (try_send)
//!     ▼
//! [bounded queue] ──► worker ──► inner.send(msg)  (per-send timeout)
//!                        │
//!                        ├──► Closed / transport closed ──► close token cancelled
//!                        └──► Full / Timeout / Transport ──► logged, next message
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `enqueue()` returns immediately; on a full queue the
//!   message is dropped for this listener only.
//! - **Per-listener FIFO**: messages reach the transport in enqueue order.
//! - **Isolation**: a slow, dead or panicking listener never delays others.
//! - **Close notification**: when the worker exits for any reason the close
//!   token is cancelled; the registry listens on it to drop the registration.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channels::{ChannelRef, PushChannel};
use crate::error::DeliveryError;
use crate::events::PushMessage;

/// A push channel driven by its own worker behind a bounded queue.
///
/// Dropping every handle closes the queue; the worker drains what is left and exits.
pub struct QueuedChannel {
    name: Arc<str>,
    sender: mpsc::Sender<Arc<PushMessage>>,
    closed: CancellationToken,
}

impl QueuedChannel {
    /// Wraps `inner` and spawns its worker on the current Tokio runtime.
    ///
    /// - `capacity` is clamped to at least 1.
    /// - `send_timeout = None` lets a send wait forever (only this listener stalls).
    #[must_use]
    pub fn spawn(inner: ChannelRef, capacity: usize, send_timeout: Option<Duration>) -> Self {
        let name: Arc<str> = Arc::from(inner.name());
        let (sender, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();

        tokio::spawn(worker(
            inner,
            rx,
            send_timeout,
            closed.clone(),
            Arc::clone(&name),
        ));

        Self {
            name,
            sender,
            closed,
        }
    }

    /// Queues a message for delivery without waiting.
    pub fn enqueue(&self, message: Arc<PushMessage>) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once the worker has stopped or [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Stops the worker; queued messages are discarded.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once the channel is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub(crate) fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl Drop for QueuedChannel {
    fn drop(&mut self) {
        debug!(channel = %self.name, "push channel handle dropped");
    }
}

async fn worker(
    inner: ChannelRef,
    mut rx: mpsc::Receiver<Arc<PushMessage>>,
    send_timeout: Option<Duration>,
    closed: CancellationToken,
    name: Arc<str>,
) {
    let transport_closed = inner.closed();
    tokio::pin!(transport_closed);

    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            _ = &mut transport_closed => {
                debug!(channel = %name, "listener disconnected");
                break;
            }
            msg = rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
        };

        match deliver(inner.as_ref(), &message, send_timeout).await {
            Ok(()) => {
                debug!(channel = %name, id = %message.id, "invoice pushed");
            }
            Err(e) if e.is_closed() => {
                debug!(channel = %name, id = %message.id, "listener closed during send");
                break;
            }
            Err(e) => {
                warn!(
                    channel = %name,
                    id = %message.id,
                    error = %e,
                    label = e.as_label(),
                    "push delivery failed"
                );
            }
        }
    }

    closed.cancel();
}

/// Sends one message with an optional timeout, converting panics into errors.
async fn deliver(
    inner: &dyn PushChannel,
    message: &PushMessage,
    send_timeout: Option<Duration>,
) -> Result<(), DeliveryError> {
    let send = AssertUnwindSafe(inner.send(message)).catch_unwind();

    let outcome = match send_timeout {
        Some(timeout) => match time::timeout(timeout, send).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => return Err(DeliveryError::Timeout { timeout }),
        },
        None => send.await,
    };

    outcome.unwrap_or_else(|panic| {
        let error = if let Some(msg) = panic.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = panic.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Err(DeliveryError::Transport { error })
    })
}
