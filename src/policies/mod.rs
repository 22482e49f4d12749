//! Retry, reconnect and registration policies.
//!
//! ## Contents
//! - [`RetryPolicy`] how long to wait before reopening a failed stream, and how often
//! - [`JitterPolicy`] optional randomization of that wait
//! - [`ReconnectPolicy`] whether a cleanly completed stream is reopened
//! - [`ConflictPolicy`] what happens when two listeners register the same key
//!
//! ## Quick wiring
//! ```text
//! Config { retry, reconnect, conflict, .. }
//!      ├─► SubscriptionManager uses:
//!      │    - retry.delay(failures) to schedule the next subscribe
//!      │    - reconnect.after_completion() on clean stream end
//!      └─► RegistrationRegistry uses conflict on register()
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → constant 5s, no jitter, unbounded.
//! - `ReconnectPolicy::Always`.
//! - `ConflictPolicy::Replace` (last writer wins).

mod conflict;
mod jitter;
mod reconnect;
mod retry;

pub use conflict::ConflictPolicy;
pub use jitter::JitterPolicy;
pub use reconnect::ReconnectPolicy;
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};
