//! # SubscriptionManager: owner of the single upstream subscription.
//!
//! Opens the invoice stream, feeds it to the [`Dispatcher`], and when the
//! stream ends decides (via [`RetryPolicy`] and [`ReconnectPolicy`]) whether and
//! when to open a new one.
//!
//! ## Reconnect loop
//! ```text
//! loop {
//!   ├─► attempt += 1
//!   ├─► run_once(source, dispatcher)          Connecting → Active
//!   │       │
//!   │       ├─ Completed ──► state = Completed
//!   │       │                 ├─ ReconnectPolicy::OnFailure ─► exit (Completed)
//!   │       │                 └─ ReconnectPolicy::Always    ─► delay = retry.delay(0)
//!   │       │
//!   │       ├─ Failed    ──► state = Failed, failures += 1 (reset first if events flowed)
//!   │       │                 ├─ !retry.allows(failures)    ─► exit (Exhausted)
//!   │       │                 └─ delay = retry.delay(failures - 1)
//!   │       │
//!   │       └─ Stopped   ──► exit (Stopped)
//!   │
//!   └─► wait(delay):
//!         ├─ elapsed          ─► continue
//!         ├─ reconnect_now()  ─► continue immediately
//!         └─ stop token       ─► exit (Stopped)
//! }
//! ```
//!
//! ## Rules
//! - Exactly one stream is open at a time; attempts never overlap.
//! - Events are dispatched one at a time, in upstream order.
//! - The retry wait runs outside the dispatch path, so a long wait never looks
//!   like a stuck dispatch and vice versa.
//! - An interrupted wait always reconnects; only the stop token ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    core::dispatcher::Dispatcher,
    core::runner::{AttemptEnd, run_once},
    error::RuntimeError,
    events::SubscriptionState,
    policies::{ReconnectPolicy, RetryPolicy},
    upstream::SourceRef,
};

/// Reconnect parameters for the manager.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManagerParams {
    pub retry: RetryPolicy,
    pub reconnect: ReconnectPolicy,
}

/// Why the manager's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerExit {
    /// Stop token cancelled.
    Stopped,
    /// Stream completed cleanly under [`ReconnectPolicy::OnFailure`].
    Completed,
    /// [`RetryPolicy::max_attempts`] consecutive failures.
    Exhausted,
    /// The manager task panicked.
    Crashed,
}

/// Drives the single upstream subscription.
pub struct SubscriptionManager {
    source: SourceRef,
    dispatcher: Dispatcher,
    params: ManagerParams,
    state: watch::Sender<SubscriptionState>,
    wake: Arc<Notify>,
}

impl SubscriptionManager {
    pub fn new(source: SourceRef, dispatcher: Dispatcher, params: ManagerParams) -> Self {
        Self {
            source,
            dispatcher,
            params,
            state: watch::Sender::new(SubscriptionState::Disconnected),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Observes the subscription state.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Wakes the loop out of a retry wait (see [`SubscriptionHandle::reconnect_now`]).
    pub(crate) fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Runs the loop on a background task.
    pub fn spawn(self, stop: CancellationToken) -> SubscriptionHandle {
        let state = self.state.subscribe();
        let wake = Arc::clone(&self.wake);
        let done = CancellationToken::new();
        let guard = done.clone().drop_guard();
        let run_stop = stop.clone();
        let join = tokio::spawn(async move {
            let _done = guard;
            self.run(run_stop).await
        });

        SubscriptionHandle {
            stop,
            wake,
            done,
            state,
            join,
        }
    }

    /// Runs the reconnect loop until stop, clean completion (if terminal) or exhaustion.
    pub async fn run(self, stop: CancellationToken) -> ManagerExit {
        let mut attempt: u64 = 0;
        let mut failures: u32 = 0;

        loop {
            if stop.is_cancelled() {
                break;
            }
            attempt += 1;

            let end = run_once(
                self.source.as_ref(),
                &self.dispatcher,
                &self.state,
                &stop,
                attempt,
            )
            .await;

            let delay = match end {
                AttemptEnd::Stopped => break,
                AttemptEnd::Completed { delivered } => {
                    self.state.send_replace(SubscriptionState::Completed);
                    failures = 0;

                    if !self.params.reconnect.after_completion() {
                        info!(attempt, delivered, "invoice subscription complete");
                        return ManagerExit::Completed;
                    }
                    info!(
                        attempt,
                        delivered, "invoice subscription complete, reconnecting"
                    );
                    self.params.retry.delay(0)
                }
                AttemptEnd::Failed {
                    error: err,
                    delivered,
                } => {
                    self.state.send_replace(SubscriptionState::Failed);
                    if delivered > 0 {
                        failures = 0;
                    }
                    failures = failures.saturating_add(1);
                    error!(
                        attempt,
                        delivered,
                        failures,
                        error = %err,
                        label = err.as_label(),
                        "error while subscribed to invoices"
                    );

                    if !self.params.retry.allows(failures) {
                        warn!(attempt, failures, "retry limit reached, giving up");
                        return ManagerExit::Exhausted;
                    }
                    self.params.retry.delay(failures - 1)
                }
            };

            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "invoice subscription retry scheduled"
            );
            if !self.wait_retry(delay, &stop).await {
                break;
            }
        }

        self.state.send_replace(SubscriptionState::Stopped);
        info!(attempt, "invoice subscription stopped");
        ManagerExit::Stopped
    }

    /// Waits before the next attempt. Returns `false` if stopped.
    ///
    /// An early wake-up is a reconnect, never an exit.
    async fn wait_retry(&self, delay: Duration, stop: &CancellationToken) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        tokio::select! {
            biased;
            _ = stop.cancelled() => false,
            _ = self.wake.notified() => {
                info!("retry wait interrupted, reconnecting now");
                true
            }
            _ = &mut sleep => true,
        }
    }
}

/// Control handle for a spawned [`SubscriptionManager`].
pub struct SubscriptionHandle {
    stop: CancellationToken,
    wake: Arc<Notify>,
    done: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
    join: JoinHandle<ManagerExit>,
}

impl SubscriptionHandle {
    /// Current state.
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// A receiver for state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Cuts the current (or next) retry wait short.
    ///
    /// A request made while a stream is open applies to the next wait.
    pub fn reconnect_now(&self) {
        self.wake.notify_one();
    }

    /// Signals the loop to close the stream and stop retrying.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancelled once the loop has ended, however it ended.
    pub fn done_token(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Waits for the loop to end on its own.
    pub async fn finished(&mut self) -> ManagerExit {
        exit_of((&mut self.join).await)
    }

    /// Stops the loop and waits up to `grace` for it; aborts it after that.
    pub async fn shutdown(mut self, grace: Duration) -> Result<ManagerExit, RuntimeError> {
        self.stop.cancel();
        match time::timeout(grace, &mut self.join).await {
            Ok(res) => Ok(exit_of(res)),
            Err(_elapsed) => {
                self.join.abort();
                Err(RuntimeError::GraceExceeded { grace })
            }
        }
    }
}

fn exit_of(res: Result<ManagerExit, tokio::task::JoinError>) -> ManagerExit {
    res.unwrap_or_else(|e| {
        error!(error = %e, "invoice subscription task crashed");
        ManagerExit::Crashed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::RecordingChannel;
    use crate::core::registry::{RegistrationRegistry, RegistryParams};
    use crate::core::testing::{Attempt, ScriptedSource};
    use crate::events::{DEFAULT_RECONNECT_HINT, InvoiceEvent};

    const INTERVAL: Duration = Duration::from_secs(5);

    fn manager(
        source: Arc<ScriptedSource>,
        reconnect: ReconnectPolicy,
        retry: RetryPolicy,
    ) -> (SubscriptionManager, Arc<RegistrationRegistry>) {
        let registry = RegistrationRegistry::new(RegistryParams::default());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), DEFAULT_RECONNECT_HINT);
        let mgr = SubscriptionManager::new(source, dispatcher, ManagerParams { retry, reconnect });
        (mgr, registry)
    }

    async fn wait_state(handle: &SubscriptionHandle, want: SubscriptionState) {
        let mut rx = handle.watch_state();
        rx.wait_for(|s| *s == want).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_n_failures_give_n_reconnects_at_fixed_interval() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::refuse("connection refused"),
            Attempt::fail_after(vec![], "stream reset"),
            Attempt::refuse("connection refused"),
            Attempt::hang(vec![]),
        ]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::OnFailure,
            RetryPolicy::constant(INTERVAL),
        );
        let handle = mgr.spawn(CancellationToken::new());

        let calls = source.wait_calls(4).await;
        wait_state(&handle, SubscriptionState::Active).await;

        // initial subscribe + exactly 3 reconnects
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], INTERVAL);
        }

        time::sleep(INTERVAL * 10).await;
        assert_eq!(source.calls(), 4);

        assert_eq!(handle.shutdown(INTERVAL).await.unwrap(), ManagerExit::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_resume_after_reconnect_without_duplicates() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::fail_after(vec![], "unavailable"),
            Attempt::hang(vec![InvoiceEvent::new(b"hello".to_vec(), 1000)]),
        ]));
        let (mgr, registry) = manager(
            source.clone(),
            ReconnectPolicy::OnFailure,
            RetryPolicy::constant(INTERVAL),
        );
        let rec = Arc::new(RecordingChannel::new());
        registry.register("aGVsbG8=".into(), rec.clone()).unwrap();

        let handle = mgr.spawn(CancellationToken::new());
        assert_eq!(rec.wait_for(1).await, vec!["aGVsbG8="]);

        time::sleep(INTERVAL * 3).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(rec.messages().len(), 1);
        assert!(rec.messages()[0].data.contains("\"amount\":1000"));

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_is_terminal_under_on_failure() {
        let source = Arc::new(ScriptedSource::new(vec![Attempt::complete(vec![])]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::OnFailure,
            RetryPolicy::constant(INTERVAL),
        );
        let mut handle = mgr.spawn(CancellationToken::new());

        assert_eq!(handle.finished().await, ManagerExit::Completed);
        assert_eq!(handle.state(), SubscriptionState::Completed);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_reconnects_under_always() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::complete(vec![]),
            Attempt::hang(vec![]),
        ]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::Always,
            RetryPolicy::constant(INTERVAL),
        );
        let handle = mgr.spawn(CancellationToken::new());

        let calls = source.wait_calls(2).await;
        assert_eq!(calls[1] - calls[0], INTERVAL);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_limit_exhausts() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::refuse("a"),
            Attempt::refuse("b"),
            Attempt::refuse("c"),
        ]));
        let retry = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::constant(INTERVAL)
        };
        let (mgr, _registry) = manager(source.clone(), ReconnectPolicy::Always, retry);
        let mut handle = mgr.spawn(CancellationToken::new());

        assert_eq!(handle.finished().await, ManagerExit::Exhausted);
        assert_eq!(handle.state(), SubscriptionState::Failed);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_wait_reconnects_immediately() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::refuse("down"),
            Attempt::hang(vec![]),
        ]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::Always,
            RetryPolicy::constant(Duration::from_secs(3600)),
        );
        let handle = mgr.spawn(CancellationToken::new());

        source.wait_calls(1).await;
        handle.reconnect_now();

        let calls = source.wait_calls(2).await;
        assert_eq!(calls[1], calls[0]);
        wait_state(&handle, SubscriptionState::Active).await;
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_retry_interval_keeps_loop_alive() {
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::refuse("down"),
            Attempt::hang(vec![]),
        ]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::Always,
            RetryPolicy::constant(Duration::MAX),
        );
        let handle = mgr.spawn(CancellationToken::new());

        wait_state(&handle, SubscriptionState::Failed).await;
        handle.reconnect_now();
        wait_state(&handle, SubscriptionState::Active).await;

        assert_eq!(source.calls(), 2);
        assert!(!handle.is_finished());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_wait() {
        let source = Arc::new(ScriptedSource::new(vec![Attempt::refuse("down")]));
        let (mgr, _registry) = manager(
            source.clone(),
            ReconnectPolicy::Always,
            RetryPolicy::constant(Duration::from_secs(3600)),
        );
        let handle = mgr.spawn(CancellationToken::new());

        wait_state(&handle, SubscriptionState::Failed).await;
        let watch = handle.watch_state();
        assert_eq!(
            handle.shutdown(Duration::from_secs(1)).await.unwrap(),
            ManagerExit::Stopped
        );
        assert_eq!(*watch.borrow(), SubscriptionState::Stopped);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_counter_resets_after_healthy_stream() {
        let retry = RetryPolicy {
            interval: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: crate::policies::JitterPolicy::None,
            max_attempts: None,
        };
        let source = Arc::new(ScriptedSource::new(vec![
            Attempt::refuse("a"),
            Attempt::refuse("b"),
            Attempt::fail_after(vec![InvoiceEvent::new(b"x".to_vec(), 1)], "c"),
            Attempt::hang(vec![]),
        ]));
        let (mgr, _registry) = manager(source.clone(), ReconnectPolicy::Always, retry);
        let handle = mgr.spawn(CancellationToken::new());

        let calls = source.wait_calls(4).await;
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
        // events flowed before the third failure: back to the first interval
        assert_eq!(calls[3] - calls[2], Duration::from_secs(1));
        handle.stop();
    }
}
