//! # What to do when the upstream stream ends cleanly.
//!
//! A stream that fails is always retried (subject to [`RetryPolicy`](crate::RetryPolicy)).
//! A stream that *completes* is a separate decision:
//!
//! ```text
//! ReconnectPolicy::OnFailure  → Completed is terminal, the manager exits
//! ReconnectPolicy::Always     → Completed waits one retry interval, then reconnects (default)
//! ```
//!
//! The default is `Always`: a payment backend only closes an invoice stream
//! when it restarts or drops the client, and a terminal `Completed` silently
//! stops every notification until the process restarts.

/// Policy for clean upstream completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Only errors trigger a reconnect; clean completion ends the subscription.
    OnFailure,
    /// Errors and clean completion both trigger a reconnect.
    #[default]
    Always,
}

impl ReconnectPolicy {
    /// Whether a cleanly completed stream should be reopened.
    #[inline]
    pub fn after_completion(&self) -> bool {
        matches!(self, ReconnectPolicy::Always)
    }
}
