//! # Dispatcher: routes one invoice event to its listener.
//!
//! Called only by the subscription manager, one event at a time, in upstream
//! order. Every outcome is local to the event: nothing here can stop the
//! subscription or affect other keys.
//!
//! ```text
//! on_event(ev)
//!   ├─► key = base64(ev.r_hash)
//!   ├─► registry.lookup(key)
//!   │     └─ none ─► NoListener (logged, dropped)
//!   ├─► PushMessage::for_invoice(ev, reconnect_hint)
//!   └─► registration.channel.enqueue(msg)
//!         ├─ Ok      ─► Queued
//!         ├─ Closed  ─► unregister this registration ─► Dropped
//!         └─ Full    ─► Dropped (listener keeps its registration)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::registry::RegistrationRegistry;
use crate::error::DeliveryError;
use crate::events::{InvoiceEvent, PushMessage};

/// What happened to one dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the listener's queue.
    Queued,
    /// Nobody is registered for this key.
    NoListener,
    /// The listener exists but did not take the message.
    Dropped {
        error: DeliveryError,
        /// Whether the listener's registration was removed as a result.
        unregistered: bool,
    },
}

/// Routes invoice events to registered listeners.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RegistrationRegistry>,
    reconnect_hint: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<RegistrationRegistry>, reconnect_hint: Duration) -> Self {
        Self {
            registry,
            reconnect_hint,
        }
    }

    /// Delivers `event` to the listener registered under its key, if any.
    ///
    /// Never blocks on the listener's transport.
    pub fn on_event(&self, event: &InvoiceEvent) -> DispatchOutcome {
        let key = event.key();
        info!(
            key = %key,
            settled = event.is_settled(),
            amount = event.amount(),
            "invoice received from subscription"
        );

        let Some(registration) = self.registry.lookup(key.as_str()) else {
            debug!(key = %key, "no listener registered for invoice");
            return DispatchOutcome::NoListener;
        };

        let message = match PushMessage::for_invoice(event, self.reconnect_hint) {
            Ok(m) => Arc::new(m),
            Err(e) => {
                let error = DeliveryError::Encode {
                    error: e.to_string(),
                };
                warn!(key = %key, error = %error, "invoice could not be encoded");
                return DispatchOutcome::Dropped {
                    error,
                    unregistered: false,
                };
            }
        };

        match registration.channel().enqueue(message) {
            Ok(()) => {
                debug!(
                    key = %key,
                    registration = %registration.id(),
                    channel = registration.channel().name(),
                    "invoice queued for listener"
                );
                DispatchOutcome::Queued
            }
            Err(error) => {
                let unregistered = error.is_closed()
                    && self
                        .registry
                        .unregister_registration(key.as_str(), registration.id());
                warn!(
                    key = %key,
                    registration = %registration.id(),
                    error = %error,
                    label = error.as_label(),
                    unregistered,
                    "invoice not delivered"
                );
                DispatchOutcome::Dropped {
                    error,
                    unregistered,
                }
            }
        }
    }
}
