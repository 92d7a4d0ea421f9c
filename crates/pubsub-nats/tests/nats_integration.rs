//! Live-server tests. Run with `cargo test -- --ignored` against a NATS server with
//! `JetStream` enabled on `localhost:4222`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use proven_pubsub::{Message, Subscription, Topic};
use proven_pubsub_nats::{Dialer, Error, url_opener};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const SERVER: &str = "nats://localhost:4222";

fn unique_subject() -> String {
    format!("test-{}", Uuid::new_v4().simple())
}

fn unique_stream() -> String {
    format!("STREAM_{}", Uuid::new_v4().simple())
}

fn hello() -> Message {
    Message::new("hello").with_metadata([("a", "1"), ("b", "2"), ("c", "3")])
}

async fn client(dialer: &Dialer) -> async_nats::Client {
    let url = url_opener::parse(SERVER).expect("Failed to parse url");

    dialer
        .opener(&url)
        .await
        .expect("Failed to get opener")
        .connection()
        .client()
        .clone()
}

async fn flush(dialer: &Dialer) {
    client(dialer).await.flush().await.expect("Failed to flush");
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_round_trip() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?subject={subject}&consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?subject={subject}"))
        .await
        .expect("Failed to open topic");

    topic
        .send_batch(&cancel, vec![hello()])
        .await
        .expect("Failed to send batch");

    let deliveries = subscription
        .receive_batch(&cancel, 1)
        .await
        .expect("Failed to receive batch");

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message, hello());
    assert_eq!(
        deliveries[0].message.metadata,
        Some(HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("c".to_string(), "3".to_string()),
        ]))
    );

    let ack_ids = deliveries.into_iter().map(|d| d.ack_id).collect();
    subscription
        .send_acks(&cancel, ack_ids)
        .await
        .expect("Failed to ack");
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_timeout_returns_empty_batch() {
    let dialer = Dialer::default();
    let subject = unique_subject();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?subject={subject}&consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");

    let deliveries = subscription
        .receive_batch(&CancellationToken::new(), 10)
        .await
        .expect("Timeout should not be an error");

    assert!(deliveries.is_empty());
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_can_nack_only_with_queue_group() {
    let dialer = Dialer::default();
    let subject = unique_subject();

    let private = dialer
        .open_subscription_url(&format!("{SERVER}?subject={subject}"))
        .await
        .expect("Failed to open subscription");
    let grouped = dialer
        .open_subscription_url(&format!("{SERVER}?subject={subject}&consumer_queue=workers"))
        .await
        .expect("Failed to open subscription");

    assert!(!private.can_nack());
    assert!(grouped.can_nack());
    assert_eq!(grouped.recv_batcher_options().max_batch_size, 1);
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_cancelled_receive() {
    let dialer = Dialer::default();
    let subject = unique_subject();

    let subscription = dialer
        .open_subscription_url(&format!("{SERVER}?subject={subject}"))
        .await
        .expect("Failed to open subscription");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = subscription.receive_batch(&cancel, 1).await;
    assert!(matches!(result, Err(Error::Canceled)));
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_unsubscribe() {
    let dialer = Dialer::default();
    let subject = unique_subject();

    let subscription = dialer
        .open_subscription_url(&format!("{SERVER}?subject={subject}"))
        .await
        .expect("Failed to open subscription");

    subscription
        .queue()
        .unsubscribe()
        .await
        .expect("Failed to unsubscribe");

    let result = subscription
        .receive_batch(&CancellationToken::new(), 1)
        .await;
    assert!(matches!(result, Err(Error::BadSubscription)));
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_jetstream_round_trip() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();
    let stream = unique_stream();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?jetstream&subject={subject}&stream_name={stream}&consumer_queue=workers\
             &consumer_max_batch_size=10&consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?jetstream&subject={subject}"))
        .await
        .expect("Failed to open topic");

    assert!(subscription.can_nack());
    assert_eq!(subscription.recv_batcher_options().max_batch_size, 10);

    topic
        .send_batch(&cancel, vec![hello(), Message::new("world")])
        .await
        .expect("Failed to send batch");

    let deliveries = subscription
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");

    let messages: Vec<_> = deliveries.iter().map(|d| d.message.clone()).collect();
    assert_eq!(messages, vec![hello(), Message::new("world")]);

    let ack_ids = deliveries.into_iter().map(|d| d.ack_id).collect();
    subscription
        .send_acks(&cancel, ack_ids)
        .await
        .expect("Failed to ack");
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_jetstream_acked_message_is_not_redelivered() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();
    let stream = unique_stream();
    let subscription_url = format!(
        "{SERVER}?jetstream&subject={subject}&stream_name={stream}&consumer_queue=workers\
         &consumer_batch_timeout=1000"
    );

    let subscription = dialer
        .open_subscription_url(&subscription_url)
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?jetstream&subject={subject}"))
        .await
        .expect("Failed to open topic");

    topic
        .send_batch(&cancel, vec![hello()])
        .await
        .expect("Failed to send batch");

    let deliveries = subscription
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");
    assert_eq!(deliveries.len(), 1);

    let ack_ids = deliveries.into_iter().map(|d| d.ack_id).collect();
    subscription
        .send_acks(&cancel, ack_ids)
        .await
        .expect("Failed to ack");
    flush(&dialer).await;

    let rebound = dialer
        .open_subscription_url(&subscription_url)
        .await
        .expect("Failed to reopen subscription");
    let redelivered = rebound
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");

    assert!(redelivered.is_empty());
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_jetstream_nacked_message_is_redelivered() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();
    let stream = unique_stream();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?jetstream&subject={subject}&stream_name={stream}\
             &consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?jetstream&subject={subject}"))
        .await
        .expect("Failed to open topic");

    topic
        .send_batch(&cancel, vec![hello()])
        .await
        .expect("Failed to send batch");

    let deliveries = subscription
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");
    assert_eq!(deliveries.len(), 1);

    let ack_ids = deliveries.into_iter().map(|d| d.ack_id).collect();
    subscription
        .send_nacks(&cancel, ack_ids)
        .await
        .expect("Failed to nack");

    let redelivered = subscription
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");

    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].message, hello());
    assert!(
        redelivered[0]
            .ack_id
            .as_jetstream()
            .is_some_and(|message| message.info().is_ok_and(|info| info.delivered >= 2))
    );
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_foreign_ack_ids_are_skipped() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();
    let stream = unique_stream();

    let plain_dialer = Dialer::default();
    let plain = plain_dialer
        .open_subscription_url(&format!(
            "{SERVER}?subject={subject}&consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let durable = dialer
        .open_subscription_url(&format!(
            "{SERVER}?jetstream&subject={subject}&stream_name={stream}\
             &consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?jetstream&subject={subject}"))
        .await
        .expect("Failed to open topic");

    topic
        .send_batch(&cancel, vec![hello()])
        .await
        .expect("Failed to send batch");

    let plain_deliveries = plain
        .receive_batch(&cancel, 1)
        .await
        .expect("Failed to receive batch");
    let durable_deliveries = durable
        .receive_batch(&cancel, 10)
        .await
        .expect("Failed to receive batch");
    assert_eq!(plain_deliveries.len(), 1);
    assert_eq!(durable_deliveries.len(), 1);

    let mixed = plain_deliveries
        .into_iter()
        .chain(durable_deliveries)
        .map(|d| d.ack_id)
        .collect();

    durable
        .send_acks(&cancel, mixed)
        .await
        .expect("Mixed batch should ack");
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_dialer_reuses_connection_for_same_base_url() {
    let dialer = Dialer::default();

    let first = dialer
        .opener(&url_opener::parse(&format!("{SERVER}?subject=foo")).expect("Failed to parse url"))
        .await
        .expect("Failed to get opener");
    let second = dialer
        .opener(
            &url_opener::parse(&format!("{SERVER}/bar?subject=baz&consumer_queue=q"))
                .expect("Failed to parse url"),
        )
        .await
        .expect("Failed to get opener");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(dialer.connection_count(), 1);
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_queue_group_settles_through_reply_subject() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?subject={subject}&consumer_queue=workers&consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let client = client(&dialer).await;

    let inbox = client.new_inbox();
    let mut replies = client
        .subscribe(inbox.clone())
        .await
        .expect("Failed to subscribe to inbox");

    for _ in 0..2 {
        client
            .publish_with_reply(subject.clone(), inbox.clone(), Bytes::from_static(b"hello"))
            .await
            .expect("Failed to publish");
    }
    client.flush().await.expect("Failed to flush");

    let first = subscription
        .receive_batch(&cancel, 1)
        .await
        .expect("Failed to receive batch");
    let second = subscription
        .receive_batch(&cancel, 1)
        .await
        .expect("Failed to receive batch");
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);

    subscription
        .send_acks(&cancel, first.into_iter().map(|d| d.ack_id).collect())
        .await
        .expect("Failed to ack");
    subscription
        .send_nacks(&cancel, second.into_iter().map(|d| d.ack_id).collect())
        .await
        .expect("Failed to nack");

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let reply = tokio::time::timeout(Duration::from_secs(5), replies.next())
            .await
            .expect("Timed out waiting for reply")
            .expect("Inbox subscription closed");
        bodies.push(reply.payload);
    }

    assert_eq!(
        bodies,
        vec![Bytes::from_static(b"+ACK"), Bytes::from_static(b"-NAK")]
    );
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_jetstream_byte_budget_returns_partial_batch() {
    let dialer = Dialer::default();
    let cancel = CancellationToken::new();
    let subject = unique_subject();
    let stream = unique_stream();

    let subscription = dialer
        .open_subscription_url(&format!(
            "{SERVER}?jetstream&subject={subject}&stream_name={stream}\
             &consumer_max_batch_size=10&consumer_max_batch_bytes_size=1024\
             &consumer_batch_timeout=1000"
        ))
        .await
        .expect("Failed to open subscription");
    let topic = dialer
        .open_topic_url(&format!("{SERVER}?jetstream&subject={subject}"))
        .await
        .expect("Failed to open topic");

    let messages: Vec<_> = (0..3).map(|_| Message::new(vec![b'x'; 600])).collect();
    topic
        .send_batch(&cancel, messages)
        .await
        .expect("Failed to send batch");

    let deliveries = subscription
        .receive_batch(&cancel, 10)
        .await
        .expect("Byte budget should end the batch, not fail it");

    assert!((1..3).contains(&deliveries.len()));
    assert!(deliveries.iter().all(|d| d.message.body.len() == 600));

    let ack_ids = deliveries.into_iter().map(|d| d.ack_id).collect();
    subscription
        .send_acks(&cancel, ack_ids)
        .await
        .expect("Failed to ack");
}

#[tokio::test]
#[ignore] // Requires NATS server with JetStream on localhost:4222
async fn test_plain_unsubscribe_waits_for_receive() {
    let dialer = Dialer::default();
    let subject = unique_subject();

    let subscription = Arc::new(
        dialer
            .open_subscription_url(&format!(
                "{SERVER}?subject={subject}&consumer_batch_timeout=1000"
            ))
            .await
            .expect("Failed to open subscription"),
    );

    let receiving = Arc::clone(&subscription);
    let receive = tokio::spawn(async move {
        receiving
            .receive_batch(&CancellationToken::new(), 1)
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    subscription
        .queue()
        .unsubscribe()
        .await
        .expect("Failed to unsubscribe");

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(
        receive
            .await
            .expect("Receive task panicked")
            .expect("Timed out receive should not fail")
            .is_empty()
    );
}
