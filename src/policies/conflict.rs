//! # Registration conflict policy.
//!
//! The registry maps one key to one listener. When a second listener registers
//! under a key that is already held, the conflict policy decides the outcome.
//!
//! ## Variants
//! - `Replace`: the newest registration wins; the previous listener silently
//!   stops receiving events for that key (default).
//! - `Reject`: the new registration fails with
//!   [`RegistryError::Conflict`](crate::RegistryError::Conflict) while the
//!   current listener is still open.
//!
//! Keys are not authenticated, so under `Replace` any client that knows a key
//! can take it over. Callers must not assume per-key exclusivity.

/// Policy for registering a key that is already held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Last writer wins.
    #[default]
    Replace,
    /// First live writer wins; later attempts are refused.
    Reject,
}
