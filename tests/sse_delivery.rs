use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;

use invoicewatch::{
    Config, InvoiceEvent, InvoiceStream, NotifierBuilder, SourceFn, SourceRef, StreamError,
    SseChannel, SubscriptionState,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Feed = mpsc::UnboundedSender<Result<InvoiceEvent, StreamError>>;

/// Source whose first subscription is fed by hand; later ones are refused.
fn fed_source() -> (Feed, SourceRef) {
    let (tx, rx) = mpsc::unbounded_channel();
    let slot = Arc::new(Mutex::new(Some(rx)));

    let source: SourceRef = SourceFn::arc("fed", move || {
        let slot = Arc::clone(&slot);
        async move {
            match slot.lock().unwrap().take() {
                Some(rx) => {
                    let stream: InvoiceStream = UnboundedReceiverStream::new(rx).boxed();
                    Ok(stream)
                }
                None => Err(StreamError::subscribe("feed already used")),
            }
        }
    });
    (tx, source)
}

#[tokio::test]
async fn invoice_updates_reach_only_their_listener() {
    init_tracing();
    let (feed, source) = fed_source();
    let notifier = NotifierBuilder::new(Config::default(), source).build();

    let (alice, mut alice_body) = SseChannel::open("alice", 8);
    let (bob, mut bob_body) = SseChannel::open("bob", 8);
    notifier.register("aGVsbG8=", Arc::new(alice)).unwrap();
    notifier.register("Ynll", Arc::new(bob)).unwrap();
    notifier.start().await.unwrap();

    feed.send(Ok(InvoiceEvent::new(b"stray".to_vec(), 5))).unwrap();
    feed.send(Ok(InvoiceEvent::new(b"hello".to_vec(), 1000))).unwrap();
    feed.send(Ok(InvoiceEvent::new(b"bye".to_vec(), 7).with_settled(true))).unwrap();

    let frame = alice_body.next().await.unwrap();
    let mut lines = frame.lines();
    assert_eq!(lines.next(), Some("event: message"));
    assert_eq!(lines.next(), Some("id: aGVsbG8="));
    assert_eq!(lines.next(), Some("retry: 3000"));
    let data = lines.next().unwrap().strip_prefix("data: ").unwrap();
    let json: serde_json::Value = serde_json::from_str(data).unwrap();
    assert_eq!(json["amount"], 1000);
    assert_eq!(json["r_hash"], "aGVsbG8=");
    assert!(frame.ends_with("\n\n"));

    let frame = bob_body.next().await.unwrap();
    assert!(frame.contains("id: Ynll\n"));
    assert!(frame.contains("\"settled\":true"));

    assert_eq!(notifier.state(), SubscriptionState::Active);
    notifier.shutdown().await.unwrap();

    // Shutdown closes every listener: both bodies end.
    assert!(alice_body.next().await.is_none());
    assert!(bob_body.next().await.is_none());
}

#[tokio::test]
async fn dropped_body_unregisters_listener() {
    init_tracing();
    let (feed, source) = fed_source();
    let notifier = NotifierBuilder::new(Config::default(), source).build();

    let (channel, body) = SseChannel::open("gone", 1);
    notifier.register("aGVsbG8=", Arc::new(channel)).unwrap();
    notifier.start().await.unwrap();
    drop(body);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !notifier.registry().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "listener still registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Events for the departed key are dropped without disturbing the stream.
    feed.send(Ok(InvoiceEvent::new(b"hello".to_vec(), 1))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(notifier.state(), SubscriptionState::Active);

    notifier.shutdown().await.unwrap();
}
