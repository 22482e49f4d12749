//! Error types used by the invoicewatch runtime.
//!
//! - [`StreamError`]: failures of the upstream invoice subscription (always retryable).
//! - [`DeliveryError`]: a push message could not reach its listener.
//! - [`RegistryError`]: a registration was refused.
//! - [`KeyError`]: a registration key is not valid base64.
//! - [`BackendError`]: invoice create/lookup calls against the payment backend.
//! - [`ConfigError`]: an environment override could not be parsed.
//! - [`RuntimeError`]: failures of the runtime itself (start/shutdown).
//!
//! Each enum provides `as_label` returning a short stable label for logs.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The subscription task did not stop within the grace period and was aborted.
    #[error("shutdown timeout {grace:?} exceeded; subscription task aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },

    /// `start` was called on a notifier whose subscription is already running.
    #[error("subscription already started")]
    AlreadyStarted,

    /// Installing the OS signal listeners failed.
    #[error("signal listener failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use invoicewatch::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Upstream subscription failures.
///
/// Every variant is recoverable: the subscription manager logs it, waits the
/// retry interval and opens a brand-new stream. None of them ever reaches a
/// registered listener.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Opening the subscription failed (connection refused, auth rejected, ...).
    #[error("subscribe failed: {error}")]
    Subscribe {
        /// The underlying error message.
        error: String,
    },

    /// The open stream reported an error.
    #[error("stream failed: {error}")]
    Stream {
        /// The underlying error message.
        error: String,
    },

    /// The stream delivered a payload that is not a valid invoice.
    #[error("malformed invoice: {error}")]
    Decode {
        /// The underlying error message.
        error: String,
    },
}

impl StreamError {
    /// Shorthand for [`StreamError::Subscribe`].
    pub fn subscribe(error: impl ToString) -> Self {
        StreamError::Subscribe {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`StreamError::Stream`].
    pub fn stream(error: impl ToString) -> Self {
        StreamError::Stream {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Subscribe { .. } => "stream_subscribe_failed",
            StreamError::Stream { .. } => "stream_failed",
            StreamError::Decode { .. } => "stream_decode_failed",
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Decode {
            error: e.to_string(),
        }
    }
}

/// # Push delivery failures.
///
/// Caught at the dispatcher boundary; none of them stop the subscription.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The listener went away; its registration should be dropped.
    #[error("listener closed")]
    Closed,

    /// The per-listener queue is full; this message was dropped.
    #[error("listener queue full")]
    Full,

    /// The transport did not accept the message in time.
    #[error("send timed out after {timeout:?}")]
    Timeout {
        /// The configured per-send timeout.
        timeout: Duration,
    },

    /// The event could not be rendered as a push message.
    #[error("encode failed: {error}")]
    Encode {
        /// The underlying error message.
        error: String,
    },

    /// Any other transport failure.
    #[error("transport failed: {error}")]
    Transport {
        /// The underlying error message.
        error: String,
    },
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Closed => "delivery_closed",
            DeliveryError::Full => "delivery_full",
            DeliveryError::Timeout { .. } => "delivery_timeout",
            DeliveryError::Encode { .. } => "delivery_encode",
            DeliveryError::Transport { .. } => "delivery_transport",
        }
    }

    /// `true` when the listener is gone for good and should be unregistered.
    pub fn is_closed(&self) -> bool {
        matches!(self, DeliveryError::Closed)
    }
}

/// # Registration failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live listener holds the key and the registry rejects conflicts.
    #[error("key {key} is already registered")]
    Conflict {
        /// The contested registration key.
        key: String,
    },

    /// The registry was closed by shutdown.
    #[error("registry closed")]
    Closed,
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Conflict { .. } => "registry_conflict",
            RegistryError::Closed => "registry_closed",
        }
    }
}

/// # Registration key decoding failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid registration key {key:?}: {error}")]
pub struct KeyError {
    /// The offending key.
    pub key: String,
    /// Decoder message.
    pub error: String,
}

/// # Payment backend failures (invoice create/lookup).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BackendError {
    /// No backend was configured on the notifier.
    #[error("invoice backend not configured")]
    NotConfigured,

    /// The key used for lookup does not decode to a payment hash.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// The backend has no invoice for this payment hash.
    #[error("invoice not found")]
    NotFound,

    /// The backend rejected or failed the call.
    #[error("backend call failed: {error}")]
    Status {
        /// The underlying error message.
        error: String,
    },
}

impl BackendError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BackendError::NotConfigured => "backend_not_configured",
            BackendError::InvalidKey(_) => "backend_invalid_key",
            BackendError::NotFound => "backend_not_found",
            BackendError::Status { .. } => "backend_status",
        }
    }
}

/// # Configuration override failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value {value:?} for {var}")]
pub struct ConfigError {
    /// Environment variable name.
    pub var: &'static str,
    /// The raw value that failed to parse.
    pub value: String,
}
