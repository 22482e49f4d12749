use std::sync::Arc;

use super::{
    config::Config,
    dispatcher::Dispatcher,
    manager::SubscriptionManager,
    notifier::InvoiceNotifier,
    registry::RegistrationRegistry,
};
use crate::upstream::{InvoiceBackend, SourceRef};

/// Builder for constructing an [`InvoiceNotifier`] with optional collaborators.
pub struct NotifierBuilder {
    cfg: Config,
    source: SourceRef,
    backend: Option<Arc<dyn InvoiceBackend>>,
}

impl NotifierBuilder {
    /// Creates a new builder around the upstream `source`.
    pub fn new(cfg: Config, source: SourceRef) -> Self {
        Self {
            cfg,
            source,
            backend: None,
        }
    }

    /// Sets the request/response backend used for invoice creation and lookup.
    ///
    /// Without one, those calls fail with `BackendError::NotConfigured`.
    pub fn with_backend(mut self, backend: Arc<dyn InvoiceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Builds the notifier. Nothing runs until [`InvoiceNotifier::start`].
    ///
    /// Initializes:
    /// - the registration registry (conflict policy, queue capacity, send timeout)
    /// - the dispatcher (client reconnect hint)
    /// - the subscription manager (retry and reconnect policies)
    pub fn build(self) -> Arc<InvoiceNotifier> {
        let registry = RegistrationRegistry::new(self.cfg.registry_params());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), self.cfg.reconnect_hint);
        let manager = SubscriptionManager::new(self.source, dispatcher, self.cfg.manager_params());

        Arc::new(InvoiceNotifier::new_internal(
            self.cfg,
            registry,
            manager,
            self.backend,
        ))
    }
}
