//! # Push channels: delivery of invoice messages to remote listeners.
//!
//! ## Architecture
//! ```text
//!                    ┌─► QueuedChannel ─► [queue] ─► worker ─► SseChannel ──► HTTP client A
//! Dispatcher ──► registry lookup
//!                    └─► QueuedChannel ─► [queue] ─► worker ─► custom PushChannel ─► client B
//! ```
//!
//! - [`PushChannel`] is the transport seam, implemented once per transport.
//! - [`QueuedChannel`] is what the registry stores: it isolates listeners from
//!   each other and from the dispatch loop.
//! - [`SseChannel`] is the built-in `text/event-stream` transport.
//!
//! ## Implementing a custom channel
//! ```no_run
//! use async_trait::async_trait;
//! use invoicewatch::{DeliveryError, PushChannel, PushMessage};
//!
//! struct Webhook;
//!
//! #[async_trait]
//! impl PushChannel for Webhook {
//!     async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError> {
//!         // POST message.data somewhere...
//!         Ok(())
//!     }
//!     fn name(&self) -> &str { "webhook" }
//! }
//! ```

mod channel;
mod queued;
mod sse;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelRef, PushChannel};
pub use queued::QueuedChannel;
pub use sse::{SseChannel, SseStream};
