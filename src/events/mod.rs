//! Data model: invoice events, push messages and subscription state.
//!
//! ## Contents
//! - [`InvoiceEvent`] one invoice state change, produced only by the upstream stream
//! - [`PushMessage`] the framed message delivered to a listener
//! - [`SubscriptionState`] lifecycle of the single upstream subscription

mod invoice;
mod message;
mod state;

pub use invoice::InvoiceEvent;
pub use message::{DEFAULT_RECONNECT_HINT, EVENT_NAME, MEDIA_TYPE, PushMessage};
pub use state::SubscriptionState;
