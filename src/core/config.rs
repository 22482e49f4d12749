//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the notifier runtime.
//!
//! Config is used in two ways:
//! 1. **Notifier creation**: `NotifierBuilder::new(config)`
//! 2. **Environment overrides**: `Config::from_env()` reads `INVOICEWATCH_*` variables over the defaults
//!
//! ## Sentinel values
//! - `send_timeout = 0s` → no per-send timeout (a stalled listener holds only its own queue)
//! - `channel_capacity = 0` → clamped to 1
//!
//! ## Environment variables
//! | variable                              | field                              |
//! |---------------------------------------|------------------------------------|
//! | `INVOICEWATCH_RETRY_INTERVAL_MS`      | `retry` (constant interval)        |
//! | `INVOICEWATCH_RETRY_MAX_ATTEMPTS`     | `retry.max_attempts` (`0` = none)  |
//! | `INVOICEWATCH_RECONNECT_ON_COMPLETE`  | `reconnect` (`true` = `Always`)    |
//! | `INVOICEWATCH_REJECT_CONFLICTS`       | `conflict` (`true` = `Reject`)     |
//! | `INVOICEWATCH_RECONNECT_HINT_MS`      | `reconnect_hint`                   |
//! | `INVOICEWATCH_CHANNEL_CAPACITY`       | `channel_capacity`                 |
//! | `INVOICEWATCH_SEND_TIMEOUT_MS`        | `send_timeout`                     |
//! | `INVOICEWATCH_GRACE_MS`               | `grace`                            |

use std::str::FromStr;
use std::time::Duration;

use crate::core::manager::ManagerParams;
use crate::core::registry::RegistryParams;
use crate::error::ConfigError;
use crate::events::DEFAULT_RECONNECT_HINT;
use crate::policies::{ConflictPolicy, ReconnectPolicy, RetryPolicy};

const RETRY_INTERVAL_MS: &str = "INVOICEWATCH_RETRY_INTERVAL_MS";
const RETRY_MAX_ATTEMPTS: &str = "INVOICEWATCH_RETRY_MAX_ATTEMPTS";
const RECONNECT_ON_COMPLETE: &str = "INVOICEWATCH_RECONNECT_ON_COMPLETE";
const REJECT_CONFLICTS: &str = "INVOICEWATCH_REJECT_CONFLICTS";
const RECONNECT_HINT_MS: &str = "INVOICEWATCH_RECONNECT_HINT_MS";
const CHANNEL_CAPACITY: &str = "INVOICEWATCH_CHANNEL_CAPACITY";
const SEND_TIMEOUT_MS: &str = "INVOICEWATCH_SEND_TIMEOUT_MS";
const GRACE_MS: &str = "INVOICEWATCH_GRACE_MS";

/// Global configuration for the notifier runtime.
///
/// Defines:
/// - **Upstream subscription**: retry and reconnect policies
/// - **Listener delivery**: queue capacity, send timeout, client reconnect hint
/// - **Registration**: what happens when a key is registered twice
/// - **Shutdown behavior**: grace period for the subscription task
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Wait between subscription attempts.
    ///
    /// The default is a constant 5 s, retried forever.
    pub retry: RetryPolicy,

    /// Whether a cleanly completed stream is reopened.
    pub reconnect: ReconnectPolicy,

    /// Policy for a second registration under a live key.
    pub conflict: ConflictPolicy,

    /// Reconnect delay suggested to listeners in every pushed message (`retry:` field).
    pub reconnect_hint: Duration,

    /// Messages buffered per listener before new ones are dropped (min 1).
    pub channel_capacity: usize,

    /// Upper bound on a single transport send.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = a send running longer fails with `DeliveryError::Timeout`; that message is
    ///   skipped and the listener stays registered
    pub send_timeout: Duration,

    /// Maximum time to wait for the subscription task to stop before aborting it.
    pub grace: Duration,
}

impl Config {
    /// Returns the per-send timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per send
    #[inline]
    pub fn send_timeout(&self) -> Option<Duration> {
        if self.send_timeout == Duration::ZERO {
            None
        } else {
            Some(self.send_timeout)
        }
    }

    /// Returns a channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Registry settings derived from this config.
    pub fn registry_params(&self) -> RegistryParams {
        RegistryParams {
            conflict: self.conflict,
            queue_capacity: self.channel_capacity_clamped(),
            send_timeout: self.send_timeout(),
        }
    }

    /// Subscription manager settings derived from this config.
    pub fn manager_params(&self) -> ManagerParams {
        ManagerParams {
            retry: self.retry,
            reconnect: self.reconnect,
        }
    }

    /// Defaults overridden by `INVOICEWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Unset variables keep their default; a set but unparsable one is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(ms) = parse::<u64, _>(&lookup, RETRY_INTERVAL_MS)? {
            let max_attempts = cfg.retry.max_attempts;
            cfg.retry = RetryPolicy {
                max_attempts,
                ..RetryPolicy::constant(Duration::from_millis(ms))
            };
        }
        if let Some(n) = parse::<u32, _>(&lookup, RETRY_MAX_ATTEMPTS)? {
            cfg.retry.max_attempts = (n > 0).then_some(n);
        }
        if let Some(always) = parse::<bool, _>(&lookup, RECONNECT_ON_COMPLETE)? {
            cfg.reconnect = if always {
                ReconnectPolicy::Always
            } else {
                ReconnectPolicy::OnFailure
            };
        }
        if let Some(reject) = parse::<bool, _>(&lookup, REJECT_CONFLICTS)? {
            cfg.conflict = if reject {
                ConflictPolicy::Reject
            } else {
                ConflictPolicy::Replace
            };
        }
        if let Some(ms) = parse::<u64, _>(&lookup, RECONNECT_HINT_MS)? {
            cfg.reconnect_hint = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<usize, _>(&lookup, CHANNEL_CAPACITY)? {
            cfg.channel_capacity = n;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, SEND_TIMEOUT_MS)? {
            cfg.send_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64, _>(&lookup, GRACE_MS)? {
            cfg.grace = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError { var, value: raw })
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `retry = RetryPolicy::default()` (constant 5s, unbounded)
    /// - `reconnect = ReconnectPolicy::Always`
    /// - `conflict = ConflictPolicy::Replace` (last writer wins)
    /// - `reconnect_hint = 3000ms`
    /// - `channel_capacity = 64`
    /// - `send_timeout = 10s`
    /// - `grace = 10s`
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            conflict: ConflictPolicy::default(),
            reconnect_hint: DEFAULT_RECONNECT_HINT,
            channel_capacity: 64,
            send_timeout: Duration::from_secs(10),
            grace: Duration::from_secs(10),
        }
    }
}
