//! Filter pipeline wiring through a running consumer

use crate::common::{CallLog, ConsumerFactory, OrderFilter, SETTLE, WAIT, publish_many, recording_handler};
use amqp_batch_consumer::{Batch, FilterDecision, PredicateFilter, TracingFilter};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_last_registered_filter_runs_first() {
    let log = CallLog::default();
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("ordered", 3)
        .filter(OrderFilter::new("F1", &log))
        .filter(OrderFilter::new("F2", &log))
        .filter(OrderFilter::new("F3", &log))
        .build(handler.with_log(log.clone()));

    assert_eq!(consumer.pipeline().filter_names(), vec!["F3", "F2", "F1"]);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "ordered", 3);
    probe.next_batch(WAIT).await.unwrap();

    assert_eq!(*log.lock(), vec!["F3", "F2", "F1", "H"]);
    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_no_filters_calls_handler_directly() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("bare", 2).build(handler);
    assert!(consumer.pipeline().is_empty());

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "bare", 2);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_skipping_filter_acknowledges_without_handler() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("skipped", 2)
        .filter(PredicateFilter::new("skip-all", |_: &Batch| FilterDecision::Skip))
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "skipped", 2);
    tokio::time::sleep(SETTLE).await;

    assert!(probe.next_batch(SETTLE).await.is_none());
    consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.acknowledged("skipped"), vec![0, 1]);
    assert_eq!(consumer.stats().batches_handled, 1);
}

#[tokio::test]
async fn test_rejecting_filter_prevents_acknowledgment() {
    let log = CallLog::default();
    let (handler, probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("rejected", 2)
        .filter(OrderFilter::new("inner", &log))
        .filter(PredicateFilter::new("size-guard", |batch: &Batch| {
            if batch.payload_bytes() > 4 {
                FilterDecision::Reject("payload too large".to_string())
            } else {
                FilterDecision::Continue
            }
        }))
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "rejected", 2);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(probe.call_count(), 0);
    assert!(log.lock().is_empty());
    assert!(broker.acknowledged("rejected").is_empty());
    assert_eq!(consumer.stats().batches_failed, 1);

    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_tracing_filter_is_transparent() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("traced", 2)
        .filter(TracingFilter::new().with_slow_threshold(Duration::from_secs(1)))
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "traced", 4);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![2, 3]);

    consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.acknowledged("traced"), vec![0, 1, 2, 3]);
}
