//! # Invoice events delivered by the upstream subscription.
//!
//! An [`InvoiceEvent`] is immutable once received. It carries the decoded
//! fields the runtime routes on (payment hash, settled flag, amount, memo) and,
//! when it was decoded from upstream JSON, the raw text so that listeners get
//! the backend payload untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::key::{RegistrationKey, base64_bytes};

/// A single invoice state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceEvent {
    /// Payment hash.
    #[serde(with = "base64_bytes")]
    r_hash: Vec<u8>,
    /// Whether the invoice has been paid.
    #[serde(default)]
    settled: bool,
    /// Invoice amount in satoshis.
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    memo: String,
    /// Upstream JSON this event was decoded from, forwarded verbatim.
    #[serde(skip)]
    raw: Option<Arc<str>>,
}

impl InvoiceEvent {
    /// Creates an unsettled event with an empty memo.
    pub fn new(r_hash: impl Into<Vec<u8>>, amount: i64) -> Self {
        Self {
            r_hash: r_hash.into(),
            settled: false,
            amount,
            memo: String::new(),
            raw: None,
        }
    }

    #[inline]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    #[inline]
    pub fn with_settled(mut self, settled: bool) -> Self {
        self.settled = settled;
        self
    }

    /// Decodes an upstream JSON invoice, keeping the text as the forwarded payload.
    ///
    /// Fields other than `r_hash`, `settled`, `amount` and `memo` are ignored
    /// for routing but survive in the payload.
    pub fn from_json(text: &str) -> Result<Self, StreamError> {
        let mut event: InvoiceEvent = serde_json::from_str(text)?;
        event.raw = Some(Arc::from(text));
        Ok(event)
    }

    pub fn r_hash(&self) -> &[u8] {
        &self.r_hash
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    /// Key a listener must have registered under to receive this event.
    pub fn key(&self) -> RegistrationKey {
        RegistrationKey::from_identifier(&self.r_hash)
    }

    /// JSON payload forwarded to listeners.
    ///
    /// Returns the upstream text when the event was decoded from JSON,
    /// otherwise serializes the decoded fields.
    pub fn payload(&self) -> Result<Arc<str>, serde_json::Error> {
        match &self.raw {
            Some(raw) => Ok(Arc::clone(raw)),
            None => serde_json::to_string(self).map(Arc::from),
        }
    }
}
