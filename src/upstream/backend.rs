//! # Invoice backend (request/response side).
//!
//! Creating an invoice yields the payment hash a client then registers under;
//! looking one up is the polling fallback for clients that never received a
//! push. Both are plain calls into the payment backend and carry no state in
//! this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::events::InvoiceEvent;
use crate::key::{RegistrationKey, base64_bytes};

/// Request to create an invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    /// Amount in satoshis.
    pub amount: i64,
    #[serde(default)]
    pub memo: String,
}

/// Result of creating an invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    /// Payment hash.
    #[serde(with = "base64_bytes")]
    pub r_hash: Vec<u8>,
    /// Encoded payment request handed to the payer.
    pub payment_request: String,
    #[serde(default)]
    pub add_index: u64,
}

impl CreatedInvoice {
    /// Key a client registers under to be notified about this invoice.
    pub fn key(&self) -> RegistrationKey {
        RegistrationKey::from_identifier(&self.r_hash)
    }
}

/// Request/response calls into the payment backend.
#[async_trait]
pub trait InvoiceBackend: Send + Sync + 'static {
    async fn add_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice, BackendError>;

    async fn lookup_invoice(&self, r_hash: &[u8]) -> Result<InvoiceEvent, BackendError>;
}

/// Looks up an invoice by the key a client registered under.
pub async fn lookup_by_key(
    backend: &dyn InvoiceBackend,
    key: &RegistrationKey,
) -> Result<InvoiceEvent, BackendError> {
    let r_hash = key.decode()?;
    backend.lookup_invoice(&r_hash).await
}
