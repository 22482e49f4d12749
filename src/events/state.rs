//! # Subscription lifecycle state.
//!
//! ```text
//! Disconnected ──► Connecting ──► Active ──► Completed
//!                      ▲            │          │ (ReconnectPolicy::Always)
//!                      │            ▼          │
//!                      └─────── Failed ◄───────┘
//!
//! any state ──(stop signal)──► Stopped
//! ```
//!
//! Exactly one state value exists per subscription manager; it is published
//! through a `tokio::sync::watch` channel so callers can observe transitions.

use std::fmt;

/// Current phase of the upstream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Not started yet.
    Disconnected,
    /// Opening a new upstream stream.
    Connecting,
    /// Stream open; events are being dispatched.
    Active,
    /// Last stream (or subscribe call) failed; a retry is scheduled.
    Failed,
    /// Upstream ended the stream cleanly.
    Completed,
    /// Stop signal received; no further retries.
    Stopped,
}

impl SubscriptionState {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionState::Disconnected => "disconnected",
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Active => "active",
            SubscriptionState::Failed => "failed",
            SubscriptionState::Completed => "completed",
            SubscriptionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
