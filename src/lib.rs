//! # invoicewatch
//!
//! **invoicewatch** keeps one long-lived subscription to a payment backend's
//! invoice stream and pushes every invoice update to the remote listener that
//! registered for it.
//!
//! Clients create an invoice, then open a push channel (typically server-sent
//! events) keyed by the invoice's payment-hash identifier. When the invoice
//! changes state upstream, exactly that listener receives a message. The
//! subscription survives backend failures by reconnecting on a fixed interval.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Payment backend
//!   ┌──────────────────────┐
//!   │ InvoiceSource        │  subscribe() ─► stream of InvoiceEvent
//!   └──────────┬───────────┘
//!              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SubscriptionManager (reconnect loop, single stream)         │
//! │  - RetryPolicy (constant 5s by default)                      │
//! │  - ReconnectPolicy (what a clean completion means)           │
//! │  - state: Disconnected/Connecting/Active/Failed/Completed    │
//! └──────────────────────────┬───────────────────────────────────┘
//!                            ▼  one event at a time, in order
//!                     ┌─────────────┐
//!                     │ Dispatcher  │  key = base64(r_hash)
//!                     └──────┬──────┘
//!                            ▼
//!               ┌──────────────────────────┐
//!               │  RegistrationRegistry    │ ◄── register(key, channel)
//!               │  (key → QueuedChannel)   │     from request handlers
//!               └──────┬──────────┬────────┘
//!                      ▼          ▼
//!                  [queue A]  [queue B]   bounded, one worker each
//!                      ▼          ▼
//!                  SseChannel  PushChannel ─► remote listeners
//! ```
//!
//! ### Lifecycle
//! ```text
//! NotifierBuilder ──► InvoiceNotifier::start() ──► SubscriptionManager::run()
//!
//! loop {
//!   ├─► subscribe()                ─► Connecting ─► Active
//!   ├─► dispatch every event       ─► listener queue (never blocks the loop)
//!   ├─ stream error  ─► Failed    ─► wait retry.delay(), reconnect
//!   ├─ stream ends   ─► Completed ─► reconnect (Always) or exit (OnFailure)
//!   └─ stop token    ─► Stopped   ─► exit
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                                |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------------|
//! | **Runtime**       | Wire registry, dispatcher and subscription; shutdown.     | [`InvoiceNotifier`], [`NotifierBuilder`]          |
//! | **Upstream**      | Streaming subscription and request/response backend.      | [`InvoiceSource`], [`SourceFn`], [`InvoiceBackend`] |
//! | **Delivery**      | Transport seam and built-in SSE transport.                | [`PushChannel`], [`SseChannel`], [`PushMessage`]  |
//! | **Policies**      | Retry interval, reconnect and key conflict behaviour.     | [`RetryPolicy`], [`ReconnectPolicy`], [`ConflictPolicy`] |
//! | **Errors**        | Typed errors with stable log labels.                      | [`StreamError`], [`DeliveryError`], [`RuntimeError`] |
//! | **Configuration** | Centralize runtime settings, environment overrides.       | [`Config`]                                        |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use invoicewatch::{Config, InvoiceStream, NotifierBuilder, SourceFn, StreamError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Adapter over the real backend stream (an empty one here).
//!     let source = SourceFn::arc("backend", || async {
//!         let stream: InvoiceStream = futures::stream::pending().boxed();
//!         Ok::<_, StreamError>(stream)
//!     });
//!
//!     let notifier = NotifierBuilder::new(Config::from_env()?, source).build();
//!     notifier.start().await?;
//!
//!     // In a request handler:
//!     let (channel, _body) = invoicewatch::SseChannel::open("client-1", 16);
//!     notifier.register("aGVsbG8=", Arc::new(channel))?;
//!
//!     notifier.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod key;

pub mod channels;
pub mod events;
pub mod policies;
pub mod upstream;

// ---- Public re-exports ----

pub use channels::{ChannelRef, PushChannel, QueuedChannel, SseChannel, SseStream};
pub use crate::core::{
    Config, DispatchOutcome, Dispatcher, InvoiceNotifier, ManagerExit, ManagerParams,
    NotifierBuilder, Registration, RegistrationId, RegistrationRegistry, RegistryParams,
    SubscriptionHandle, SubscriptionManager,
};
pub use error::{
    BackendError, ConfigError, DeliveryError, KeyError, RegistryError, RuntimeError, StreamError,
};
pub use events::{InvoiceEvent, PushMessage, SubscriptionState};
pub use key::RegistrationKey;
pub use policies::{ConflictPolicy, JitterPolicy, ReconnectPolicy, RetryPolicy};
pub use upstream::{
    CreatedInvoice, InvoiceBackend, InvoiceRequest, InvoiceSource, InvoiceStream, SourceFn,
    SourceRef, lookup_by_key,
};
