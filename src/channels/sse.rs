//! # Server-sent events transport.
//!
//! [`SseChannel::open`] returns the channel half (register it with the
//! notifier) and a stream of `text/event-stream` frames (hand it to the HTTP
//! layer as the response body). When the HTTP layer drops the body because the
//! client disconnected, the channel reports itself closed and its registration
//! is removed.
//!
//! ```text
//! notifier.register(key, channel)      HTTP response body
//!            │                                  ▲
//!            ▼                                  │
//!  SseChannel::send ──► mpsc (bounded) ──► SseStream (frames)
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::PushChannel;
use crate::error::DeliveryError;
use crate::events::PushMessage;

/// Push channel writing event-stream frames for one HTTP client.
pub struct SseChannel {
    name: Arc<str>,
    tx: mpsc::Sender<String>,
}

/// Body half of an [`SseChannel`]: yields one complete frame per message.
pub struct SseStream {
    inner: ReceiverStream<String>,
}

impl SseChannel {
    /// Opens a channel whose body buffers up to `buffer` frames (min 1).
    pub fn open(name: impl Into<Arc<str>>, buffer: usize) -> (Self, SseStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                name: name.into(),
                tx,
            },
            SseStream {
                inner: ReceiverStream::new(rx),
            },
        )
    }
}

#[async_trait]
impl PushChannel for SseChannel {
    async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError> {
        self.tx
            .send(message.to_sse_frame())
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Stream for SseStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
