//! # InvoiceNotifier: wires registry, dispatcher and subscription together.
//!
//! The [`InvoiceNotifier`] owns the [`RegistrationRegistry`], the single
//! upstream subscription, and the optional request/response backend. Request
//! handlers talk to it; nothing else needs to.
//!
//! ## High-level architecture
//! ```text
//! HTTP layer (outside this crate)
//!   ├─ POST invoice   ─► create_invoice(request)      ─► InvoiceBackend::add_invoice
//!   ├─ GET  invoice   ─► lookup_invoice_by_key(key)   ─► InvoiceBackend::lookup_invoice
//!   └─ GET  events    ─► register(key, SseChannel)    ─► RegistrationRegistry
//!
//! start():
//!   SubscriptionManager::spawn(runtime_token.child_token())
//!        └─ InvoiceSource stream ─► Dispatcher ─► registry.lookup ─► QueuedChannel ─► listener
//!
//! Shutdown path:
//!   shutdown::wait_for_shutdown_signal()   (or the subscription ending on its own)
//!             └─► runtime_token.cancel()  → subscription stream dropped
//!             └─► wait up to cfg.grace:
//!                    ├─ Ok (joined)       → registry.close() closes every listener
//!                    └─ Timeout exceeded  → task aborted, RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use futures::{StreamExt, stream};
//! use invoicewatch::{
//!     Config, InvoiceEvent, InvoiceStream, NotifierBuilder, SourceFn, StreamError,
//!     channels::SseChannel,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SourceFn::arc("demo", || async {
//!         let events = vec![Ok(InvoiceEvent::new(b"hello".to_vec(), 1000))];
//!         let stream: InvoiceStream = stream::iter(events).chain(stream::pending()).boxed();
//!         Ok::<_, StreamError>(stream)
//!     });
//!     let notifier = NotifierBuilder::new(Config::default(), source).build();
//!
//!     let (channel, mut body) = SseChannel::open("demo-client", 8);
//!     notifier.register("aGVsbG8=", Arc::new(channel))?;
//!     notifier.start().await?;
//!
//!     let frame = body.next().await.unwrap();
//!     assert!(frame.starts_with("event: message\nid: aGVsbG8=\n"));
//!
//!     notifier.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    channels::ChannelRef,
    core::{
        config::Config,
        manager::{ManagerExit, SubscriptionHandle, SubscriptionManager},
        registry::{RegistrationId, RegistrationRegistry},
        shutdown,
    },
    error::{BackendError, RegistryError, RuntimeError},
    events::{InvoiceEvent, SubscriptionState},
    key::RegistrationKey,
    upstream::{CreatedInvoice, InvoiceBackend, InvoiceRequest, lookup_by_key},
};

/// Lifecycle of the subscription task.
enum Slot {
    /// Built, not started.
    Idle(SubscriptionManager),
    Running(SubscriptionHandle),
    /// Shut down (or never started and shut down).
    Done,
}

/// Entry point for request handlers: registration, lookups and lifecycle.
pub struct InvoiceNotifier {
    cfg: Config,
    registry: Arc<RegistrationRegistry>,
    backend: Option<Arc<dyn InvoiceBackend>>,
    runtime_token: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
    wake: Arc<Notify>,
    slot: Mutex<Slot>,
}

impl InvoiceNotifier {
    pub(crate) fn new_internal(
        cfg: Config,
        registry: Arc<RegistrationRegistry>,
        manager: SubscriptionManager,
        backend: Option<Arc<dyn InvoiceBackend>>,
    ) -> Self {
        Self {
            cfg,
            registry,
            backend,
            runtime_token: CancellationToken::new(),
            state: manager.state(),
            wake: manager.waker(),
            slot: Mutex::new(Slot::Idle(manager)),
        }
    }

    /// Opens the upstream subscription on a background task.
    ///
    /// Fails with [`RuntimeError::AlreadyStarted`] on a second call, including
    /// after shutdown.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Idle(manager) => {
                *slot = Slot::Running(manager.spawn(self.runtime_token.child_token()));
                info!("invoice notifier started");
                Ok(())
            }
            other => {
                *slot = other;
                Err(RuntimeError::AlreadyStarted)
            }
        }
    }

    /// Registers `channel` as the listener for `key`.
    ///
    /// Any string is accepted; it does not have to match an existing invoice.
    /// Fails with [`RegistryError::Closed`] once [`shutdown`](Self::shutdown) has run.
    pub fn register(
        &self,
        key: impl Into<RegistrationKey>,
        channel: ChannelRef,
    ) -> Result<RegistrationId, RegistryError> {
        self.registry.register(key.into(), channel)
    }

    /// Removes the listener for `key`, if any.
    pub fn unregister(&self, key: &str) -> bool {
        self.registry.unregister(key)
    }

    /// Current state of the upstream subscription.
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// A receiver for subscription state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Skips the current (or next) retry wait.
    pub fn reconnect_now(&self) {
        self.wake.notify_one();
    }

    pub fn registry(&self) -> &Arc<RegistrationRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Creates an invoice through the backend.
    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<CreatedInvoice, BackendError> {
        let backend = self.backend()?;
        let created = backend.add_invoice(request).await?;
        info!(
            key = %created.key(),
            amount = request.amount,
            "invoice created"
        );
        Ok(created)
    }

    /// Fetches the invoice a listener would register for, by its key.
    pub async fn lookup_invoice_by_key(
        &self,
        key: &RegistrationKey,
    ) -> Result<InvoiceEvent, BackendError> {
        lookup_by_key(self.backend()?.as_ref(), key).await
    }

    fn backend(&self) -> Result<&Arc<dyn InvoiceBackend>, BackendError> {
        self.backend.as_ref().ok_or(BackendError::NotConfigured)
    }

    /// Stops the subscription, waits up to [`Config::grace`], then closes every listener.
    ///
    /// Idempotent: later calls return `Ok(ManagerExit::Stopped)`.
    pub async fn shutdown(&self) -> Result<ManagerExit, RuntimeError> {
        self.runtime_token.cancel();
        let slot = std::mem::replace(&mut *self.slot.lock().await, Slot::Done);

        let res = match slot {
            Slot::Running(handle) => handle.shutdown(self.cfg.grace).await,
            Slot::Idle(_) | Slot::Done => Ok(ManagerExit::Stopped),
        };
        self.registry.close();

        match &res {
            Ok(exit) => info!(exit = ?exit, "invoice notifier stopped"),
            Err(e) => warn!(error = %e, label = e.as_label(), "invoice notifier stopped"),
        }
        res
    }

    /// Starts (if needed) and runs until an OS termination signal arrives or the
    /// subscription ends on its own, then shuts down.
    pub async fn run_until_shutdown(&self) -> Result<ManagerExit, RuntimeError> {
        match self.start().await {
            Ok(()) | Err(RuntimeError::AlreadyStarted) => {}
            Err(e) => return Err(e),
        }
        let done = match &*self.slot.lock().await {
            Slot::Running(handle) => Some(handle.done_token()),
            Slot::Idle(_) | Slot::Done => None,
        };
        let Some(done) = done else {
            return self.shutdown().await;
        };

        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => match res {
                Ok(signal) => info!(signal, "shutdown requested"),
                Err(e) => {
                    warn!(error = %e, "signal listener failed, shutting down");
                    self.shutdown().await?;
                    return Err(RuntimeError::Signal(e));
                }
            },
            _ = done.cancelled() => info!("invoice subscription ended"),
        }
        self.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time;

    use super::*;
    use crate::channels::testing::RecordingChannel;
    use crate::core::builder::NotifierBuilder;
    use crate::core::testing::{Attempt, ScriptedSource};
    use crate::policies::{ReconnectPolicy, RetryPolicy};
    use crate::upstream::testing::MemoryBackend;

    fn config() -> Config {
        Config {
            retry: RetryPolicy::constant(Duration::from_secs(5)),
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registered_listener_gets_invoice() {
        let source = Arc::new(ScriptedSource::new(vec![Attempt::hang(vec![
            InvoiceEvent::new(b"other".to_vec(), 1),
            InvoiceEvent::new(b"hello".to_vec(), 1000),
        ])]));
        let notifier = NotifierBuilder::new(config(), source).build();

        let rec = Arc::new(RecordingChannel::new());
        notifier.register("aGVsbG8=", rec.clone()).unwrap();
        notifier.start().await.unwrap();

        assert_eq!(rec.wait_for(1).await, vec!["aGVsbG8="]);
        let sent = rec.messages();
        assert_eq!(sent[0].event, "message");
        assert_eq!(sent[0].media_type, "application/json");
        assert_eq!(sent[0].retry, Duration::from_millis(3000));
        assert!(sent[0].data.contains("\"amount\":1000"));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(rec.messages().len(), 1);
        assert_eq!(notifier.state(), SubscriptionState::Active);

        notifier.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_error_reconnects_once() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::fail_after(vec![], "unavailable"),
            Attempt::hang(vec![InvoiceEvent::new(b"hello".to_vec(), 1000)]),
        ]));
        let notifier = NotifierBuilder::new(config(), source.clone()).build();
        let rec = Arc::new(RecordingChannel::new());
        notifier.register("aGVsbG8=", rec.clone()).unwrap();
        notifier.start().await.unwrap();

        rec.wait_for(1).await;
        let calls = source.wait_calls(2).await;
        assert_eq!(calls[1] - calls[0], Duration::from_secs(5));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(rec.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let notifier = NotifierBuilder::new(config(), source).build();

        notifier.start().await.unwrap();
        assert!(matches!(
            notifier.start().await,
            Err(RuntimeError::AlreadyStarted)
        ));
        notifier.shutdown().await.unwrap();
        assert!(matches!(
            notifier.start().await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_listeners() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let notifier = NotifierBuilder::new(config(), source).build();
        notifier.register("YQ==", Arc::new(RecordingChannel::new())).unwrap();
        let listener = notifier.registry().lookup("YQ==").unwrap();
        notifier.start().await.unwrap();

        assert_eq!(notifier.shutdown().await.unwrap(), ManagerExit::Stopped);
        assert!(notifier.registry().is_empty());
        assert!(listener.channel().is_closed());
        assert_eq!(notifier.state(), SubscriptionState::Stopped);
        assert_eq!(notifier.shutdown().await.unwrap(), ManagerExit::Stopped);

        let late = notifier.register("YWI=", Arc::new(RecordingChannel::new()));
        assert_eq!(late, Err(RegistryError::Closed));
        assert!(notifier.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown_returns_when_subscription_ends() {
        let source = Arc::new(ScriptedSource::new(vec![Attempt::complete(vec![])]));
        let cfg = Config {
            reconnect: ReconnectPolicy::OnFailure,
            ..config()
        };
        let notifier = NotifierBuilder::new(cfg, source).build();

        assert_eq!(
            notifier.run_until_shutdown().await.unwrap(),
            ManagerExit::Completed
        );
    }

    #[tokio::test]
    async fn test_backend_calls() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let bare = NotifierBuilder::new(config(), source.clone()).build();
        assert!(matches!(
            bare.lookup_invoice_by_key(&"YQ==".into()).await,
            Err(BackendError::NotConfigured)
        ));

        let notifier = NotifierBuilder::new(config(), source)
            .with_backend(Arc::new(MemoryBackend::default()))
            .build();
        let created = notifier
            .create_invoice(&InvoiceRequest {
                amount: 1000,
                memo: "coffee".into(),
            })
            .await
            .unwrap();

        let invoice = notifier.lookup_invoice_by_key(&created.key()).await.unwrap();
        assert_eq!(invoice.amount(), 1000);
        assert_eq!(invoice.memo(), "coffee");
    }
}
