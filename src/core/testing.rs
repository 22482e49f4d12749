//! Scripted upstream source for subscription tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::StreamError;
use crate::events::InvoiceEvent;
use crate::upstream::{InvoiceSource, InvoiceStream};

/// What one `subscribe` call produces.
pub(crate) struct Attempt {
    refuse: Option<StreamError>,
    items: Vec<Result<InvoiceEvent, StreamError>>,
    hang: bool,
}

impl Attempt {
    /// The subscribe call itself fails.
    pub fn refuse(error: &str) -> Self {
        Self {
            refuse: Some(StreamError::subscribe(error)),
            items: Vec::new(),
            hang: false,
        }
    }

    /// Yields `events`, then a stream error.
    pub fn fail_after(events: Vec<InvoiceEvent>, error: &str) -> Self {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(StreamError::stream(error)));
        Self {
            refuse: None,
            items,
            hang: false,
        }
    }

    /// Yields `events`, then ends cleanly.
    pub fn complete(events: Vec<InvoiceEvent>) -> Self {
        Self {
            refuse: None,
            items: events.into_iter().map(Ok).collect(),
            hang: false,
        }
    }

    /// Yields `events`, then stays open forever.
    pub fn hang(events: Vec<InvoiceEvent>) -> Self {
        Self {
            hang: true,
            ..Self::complete(events)
        }
    }
}

/// Plays one [`Attempt`] per subscribe call; hangs once the script runs out.
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Attempt>>,
    calls: watch::Sender<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Attempt>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: watch::Sender::new(Vec::new()),
        }
    }

    /// Waits until `subscribe` was called at least `n` times; returns call instants.
    pub async fn wait_calls(&self, n: usize) -> Vec<Instant> {
        let mut rx = self.calls.subscribe();
        rx.wait_for(|c| c.len() >= n).await.unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.borrow().len()
    }
}

#[async_trait]
impl InvoiceSource for ScriptedSource {
    async fn subscribe(&self) -> Result<InvoiceStream, StreamError> {
        self.calls.send_modify(|c| c.push(Instant::now()));

        let attempt = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Attempt::hang(Vec::new()));

        if let Some(error) = attempt.refuse {
            return Err(error);
        }
        let tail: InvoiceStream = if attempt.hang {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };
        Ok(stream::iter(attempt.items).chain(tail).boxed())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
