//! # Push message format.
//!
//! Every delivery to a listener is a [`PushMessage`]:
//! ```text
//! event: message
//! id: <registration key>
//! retry: 3000
//! data: <JSON invoice payload>
//! ```
//! The media type of `data` is always `application/json`.

use std::sync::Arc;
use std::time::Duration;

use crate::events::InvoiceEvent;
use crate::key::RegistrationKey;

/// Event name attached to every invoice message.
pub const EVENT_NAME: &str = "message";

/// Media type of the message data.
pub const MEDIA_TYPE: &str = "application/json";

/// Default reconnect hint handed to clients.
pub const DEFAULT_RECONNECT_HINT: Duration = Duration::from_millis(3000);

/// A message ready to be pushed to one listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushMessage {
    pub event: &'static str,
    /// Registration key of the invoice.
    pub id: RegistrationKey,
    pub media_type: &'static str,
    /// JSON payload.
    pub data: Arc<str>,
    /// How long a client should wait before reconnecting its stream.
    pub retry: Duration,
}

impl PushMessage {
    /// Builds the message for `event` with the given client reconnect hint.
    pub fn for_invoice(
        event: &InvoiceEvent,
        reconnect_hint: Duration,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: EVENT_NAME,
            id: event.key(),
            media_type: MEDIA_TYPE,
            data: event.payload()?,
            retry: reconnect_hint,
        })
    }

    /// Renders the message as one `text/event-stream` frame.
    ///
    /// Multi-line data is split into one `data:` field per line.
    pub fn to_sse_frame(&self) -> String {
        let mut frame = String::with_capacity(self.data.len() + 64);
        frame.push_str("event: ");
        frame.push_str(self.event);
        frame.push_str("\nid: ");
        frame.push_str(self.id.as_str());
        frame.push_str("\nretry: ");
        frame.push_str(&self.retry.as_millis().to_string());
        frame.push('\n');
        for line in self.data.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}
