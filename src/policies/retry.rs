//! # Retry policy for the upstream subscription.
//!
//! [`RetryPolicy`] decides how long the subscription manager waits before
//! opening a new stream after a failure, and whether it retries at all.
//!
//! The default is the reference behaviour: a constant 5 s wait, no jitter, no
//! attempt limit. `factor > 1.0` turns it into exponential growth capped at
//! [`RetryPolicy::max`].
//!
//! The delay for the `n`-th consecutive failure (0-indexed) is
//! `interval × factor^n`, clamped to `max`, then jittered. The base is derived
//! from `n` alone, so jitter output never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use invoicewatch::{JitterPolicy, RetryPolicy};
//!
//! let retry = RetryPolicy::constant(Duration::from_secs(5));
//! assert_eq!(retry.delay(0), Duration::from_secs(5));
//! assert_eq!(retry.delay(40), Duration::from_secs(5));
//!
//! let growing = RetryPolicy {
//!     interval: Duration::from_millis(500),
//!     factor: 2.0,
//!     max: Duration::from_secs(4),
//!     jitter: JitterPolicy::None,
//!     max_attempts: None,
//! };
//! assert_eq!(growing.delay(2), Duration::from_secs(2));
//! assert_eq!(growing.delay(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reference retry interval for the invoice subscription.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Wait-and-retry parameters for the upstream subscription.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub interval: Duration,
    /// Growth factor per consecutive failure (`1.0` = constant).
    pub factor: f64,
    /// Upper bound on any delay.
    pub max: Duration,
    pub jitter: JitterPolicy,
    /// Consecutive failures tolerated before giving up (`None` = retry forever).
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    /// Constant 5 s, no jitter, unbounded.
    fn default() -> Self {
        Self::constant(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy {
    /// Constant delay, no jitter, unbounded retries.
    pub fn constant(interval: Duration) -> Self {
        Self {
            interval,
            factor: 1.0,
            max: interval,
            jitter: JitterPolicy::None,
            max_attempts: None,
        }
    }

    /// Delay before retrying after the `failures`-th consecutive failure (0-indexed).
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.interval.as_secs_f64() * self.factor.powi(exp);

        // Near Duration::MAX the f64 round trip can land above the cap or out of range.
        let base = Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max));
        self.jitter.apply(base)
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    #[inline]
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|limit| failures < limit)
    }
}
