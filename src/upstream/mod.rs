//! Collaborators on the payment-backend side.
//!
//! - [`InvoiceSource`] the streaming subscription (consumed by the subscription manager)
//! - [`InvoiceBackend`] create/lookup calls (used by the HTTP layer, not by the core loop)

mod backend;
mod source;

#[cfg(test)]
pub(crate) use backend::testing;

pub use backend::{CreatedInvoice, InvoiceBackend, InvoiceRequest, lookup_by_key};
pub use source::{InvoiceSource, InvoiceStream, SourceFn, SourceRef};
