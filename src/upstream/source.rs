//! # Upstream invoice subscription.
//!
//! [`InvoiceSource`] opens the backend's invoice stream. Each call to
//! [`subscribe`](InvoiceSource::subscribe) must return a brand-new stream; the
//! subscription manager calls it again after every failure. Credentials and
//! transport setup belong to the implementation.
//!
//! [`SourceFn`] wraps a closure `Fn() -> Fut`, producing a fresh subscribe
//! future per attempt, which is handy for adapters and tests.
//!
//! ## Example
//! ```rust
//! use futures::stream::{self, StreamExt};
//! use invoicewatch::{InvoiceEvent, SourceFn, SourceRef, StreamError};
//!
//! let source: SourceRef = SourceFn::arc("static", || async {
//!     let events = vec![Ok(InvoiceEvent::new(b"hello".to_vec(), 1000))];
//!     Ok::<_, StreamError>(stream::iter(events).boxed())
//! });
//! assert_eq!(source.name(), "static");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StreamError;
use crate::events::InvoiceEvent;

/// Live, in-order, possibly infinite sequence of invoice events.
///
/// Ends with `None` on clean completion; an `Err` item marks the stream as failed.
pub type InvoiceStream = BoxStream<'static, Result<InvoiceEvent, StreamError>>;

/// Backend that can open an invoice subscription.
#[async_trait]
pub trait InvoiceSource: Send + Sync + 'static {
    /// Opens a new subscription stream.
    async fn subscribe(&self) -> Result<InvoiceStream, StreamError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        "invoice-source"
    }
}

/// Shared handle to a source.
pub type SourceRef = Arc<dyn InvoiceSource>;

/// Closure-backed [`InvoiceSource`].
pub struct SourceFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SourceFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the source as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> InvoiceSource for SourceFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<InvoiceStream, StreamError>> + Send + 'static,
{
    async fn subscribe(&self) -> Result<InvoiceStream, StreamError> {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
