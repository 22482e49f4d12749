//! # Push channel trait
//!
//! `PushChannel` is the seam to whatever transport carries server-pushed
//! messages to one remote listener (an HTTP event stream, a websocket, a test
//! recorder). The runtime never calls it from the dispatch loop directly: each
//! registered channel is driven by its own worker behind a bounded queue
//! ([`QueuedChannel`](crate::channels::QueuedChannel)).
//!
//! ## Contract
//! - `send` returns an error instead of panicking; [`DeliveryError::Closed`]
//!   means the listener is gone and its registration will be removed.
//! - `closed` resolves once the transport knows the listener disconnected.
//!   Transports that cannot tell may keep the default (never resolves); they
//!   are cleaned up on their first failed `send`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::events::PushMessage;

/// Delivery sink for one remote listener.
#[async_trait]
pub trait PushChannel: Send + Sync + 'static {
    /// Transmits one message.
    async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError>;

    /// Resolves when the remote side has gone away.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a push channel.
pub type ChannelRef = Arc<dyn PushChannel>;
