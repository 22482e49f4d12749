//! Test doubles for push channels.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::channels::PushChannel;
use crate::error::DeliveryError;
use crate::events::{EVENT_NAME, MEDIA_TYPE, PushMessage};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Record,
    Close,
    Panic,
}

/// Records every message it is asked to send.
pub(crate) struct RecordingChannel {
    mode: Mode,
    sent: Mutex<Vec<PushMessage>>,
    count: watch::Sender<usize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::with_mode(Mode::Record)
    }

    /// Every send reports the listener as gone.
    pub fn closing() -> Self {
        Self::with_mode(Mode::Close)
    }

    /// Every send panics.
    pub fn panicking() -> Self {
        Self::with_mode(Mode::Panic)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            sent: Mutex::new(Vec::new()),
            count: watch::Sender::new(0),
        }
    }

    pub fn messages(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .map(|m| m.id.into_string())
            .collect()
    }

    /// Waits until at least `n` messages were recorded, returns their ids.
    pub async fn wait_for(&self, n: usize) -> Vec<String> {
        let mut rx = self.count.subscribe();
        rx.wait_for(|c| *c >= n).await.unwrap();
        self.ids()
    }
}

#[async_trait]
impl PushChannel for RecordingChannel {
    async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError> {
        match self.mode {
            Mode::Record => {
                let len = {
                    let mut sent = self.sent.lock().unwrap();
                    sent.push(message.clone());
                    sent.len()
                };
                self.count.send_replace(len);
                Ok(())
            }
            Mode::Close => Err(DeliveryError::Closed),
            Mode::Panic => panic!("listener exploded"),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Never completes a send.
pub(crate) struct StalledChannel;

#[async_trait]
impl PushChannel for StalledChannel {
    async fn send(&self, _message: &PushMessage) -> Result<(), DeliveryError> {
        std::future::pending().await
    }
}

/// A minimal message with the given id.
pub(crate) fn message(id: &str) -> PushMessage {
    PushMessage {
        event: EVENT_NAME,
        id: id.into(),
        media_type: MEDIA_TYPE,
        data: "{}".into(),
        retry: Duration::from_millis(3000),
    }
}
