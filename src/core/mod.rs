//! Runtime core: subscription, routing and lifecycle.
//!
//! The public entry point is [`InvoiceNotifier`] (built with [`NotifierBuilder`]);
//! the pieces it wires are public too for embedding them separately.
//!
//! Modules:
//! - [`registry`]: concurrent key → listener map;
//! - [`dispatcher`]: routes one invoice event to its listener;
//! - [`runner`]: runs one subscription attempt to its end;
//! - [`manager`]: reconnect loop around the runner (retry, reconnect policy, state);
//! - [`notifier`]: wires everything, handles shutdown;
//! - [`shutdown`]: OS termination signals;
//! - [`config`]: runtime settings and environment overrides.

mod builder;
mod config;
mod dispatcher;
mod manager;
mod notifier;
mod registry;
mod runner;
mod shutdown;

#[cfg(test)]
mod testing;

pub use builder::NotifierBuilder;
pub use config::Config;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use manager::{ManagerExit, ManagerParams, SubscriptionHandle, SubscriptionManager};
pub use notifier::InvoiceNotifier;
pub use registry::{Registration, RegistrationId, RegistrationRegistry, RegistryParams};
