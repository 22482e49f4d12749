//! # Run a single subscription attempt.
//!
//! Opens one upstream stream and reads it to its end, handing every event to
//! the [`Dispatcher`] before reading the next one.
//!
//! ## Flow
//! ```text
//! state = Connecting
//! source.subscribe()
//!   ├─ Err(e)     ─► Failed { e }
//!   └─ Ok(stream) ─► state = Active
//!        loop stream.next()
//!          ├─ Some(Ok(ev)) ─► dispatcher.on_event(ev)
//!          ├─ Some(Err(e)) ─► Failed { e }
//!          └─ None         ─► Completed
//!
//! stop token cancelled at any await ─► Stopped (stream dropped = upstream closed)
//! ```

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    core::dispatcher::Dispatcher,
    error::StreamError,
    events::SubscriptionState,
    upstream::InvoiceSource,
};

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptEnd {
    /// Upstream ended the stream cleanly.
    Completed { delivered: u64 },
    /// Subscribe call or stream failed.
    Failed { error: StreamError, delivered: u64 },
    /// Stop token fired.
    Stopped,
}

/// Opens one stream from `source` and dispatches it until it ends.
pub(crate) async fn run_once(
    source: &dyn InvoiceSource,
    dispatcher: &Dispatcher,
    state: &watch::Sender<SubscriptionState>,
    stop: &CancellationToken,
    attempt: u64,
) -> AttemptEnd {
    state.send_replace(SubscriptionState::Connecting);
    info!(source = source.name(), attempt, "starting invoice subscription");

    let opened = tokio::select! {
        biased;
        _ = stop.cancelled() => return AttemptEnd::Stopped,
        res = source.subscribe() => res,
    };
    let mut stream = match opened {
        Ok(s) => s,
        Err(error) => return AttemptEnd::Failed { error, delivered: 0 },
    };

    state.send_replace(SubscriptionState::Active);
    debug!(source = source.name(), attempt, "invoice subscription active");

    let mut delivered: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => return AttemptEnd::Stopped,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                dispatcher.on_event(&event);
                delivered += 1;
            }
            Some(Err(error)) => return AttemptEnd::Failed { error, delivered },
            None => return AttemptEnd::Completed { delivered },
        }
    }
}
