//! Start, stop, cancellation and broker faults

use crate::common::{ConsumerFactory, SETTLE, WAIT, publish_many, recording_handler};
use crate::{assert_err, assert_ok};
use amqp_batch_consumer::{ConsumerError, HandlerState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_stop_twice_drains_once() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("twice", 10).build(handler);

    assert_ok!(consumer.start(&CancellationToken::new()).await);
    publish_many(&broker, "twice", 3);
    tokio::time::sleep(SETTLE).await;

    assert_ok!(consumer.stop(&CancellationToken::new()).await);
    assert_ok!(consumer.stop(&CancellationToken::new()).await);

    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);
    assert!(probe.try_next_batch().is_none());
    assert_eq!(broker.acknowledged("twice"), vec![0, 1, 2]);
    assert_eq!(consumer.state(), HandlerState::Stopped);
    assert_eq!(broker.open_connections(), 0);
}

#[tokio::test]
async fn test_stop_without_drain_discards_pending() {
    let (handler, probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("discard", 10)
        .drain_on_stop(false)
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "discard", 3);
    tokio::time::sleep(SETTLE).await;
    consumer.stop(&CancellationToken::new()).await.unwrap();

    assert_eq!(probe.call_count(), 0);
    assert!(broker.acknowledged("discard").is_empty());
    assert_eq!(broker.ready_count("discard"), 3);
    assert_eq!(consumer.stats().deliveries_discarded, 3);
}

#[tokio::test]
async fn test_cancelled_stop_gives_up_after_drain_timeout() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("slow-drain", 10)
        .drain_timeout(Duration::from_millis(50))
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    probe.set_delay(Duration::from_secs(30), false);
    publish_many(&broker, "slow-drain", 3);
    tokio::time::sleep(SETTLE).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = assert_err!(consumer.stop(&cancel).await);

    assert!(err.is_warning());
    assert!(matches!(
        err,
        ConsumerError::CancelledDuringDrain { pending: 3, .. }
    ));
    assert_eq!(consumer.state(), HandlerState::Stopped);
    assert_eq!(broker.open_connections(), 0);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);
    assert!(broker.acknowledged("slow-drain").is_empty());
}

#[tokio::test]
async fn test_cancelled_stop_with_cooperative_handler() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("cooperative", 10)
        .drain_timeout(Duration::from_secs(5))
        .build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    probe.set_delay(Duration::from_secs(30), true);
    publish_many(&broker, "cooperative", 3);
    tokio::time::sleep(SETTLE).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = assert_err!(consumer.stop(&cancel).await);
    assert!(matches!(
        err,
        ConsumerError::CancelledDuringDrain { pending: 3, .. }
    ));
    assert_eq!(consumer.state(), HandlerState::Stopped);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);
    assert!(broker.acknowledged("cooperative").is_empty());
    assert_eq!(broker.ready_count("cooperative"), 3);
    assert_eq!(consumer.stats().batches_failed, 1);
}

#[tokio::test]
async fn test_already_cancelled_stop_reports_abandoned_drain() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("pre-cancelled", 10).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    probe.set_delay(Duration::from_secs(30), true);
    publish_many(&broker, "pre-cancelled", 3);
    tokio::time::sleep(SETTLE).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = assert_err!(consumer.stop(&cancel).await);

    assert!(err.is_warning());
    assert!(matches!(
        err,
        ConsumerError::CancelledDuringDrain { pending: 3, .. }
    ));
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);
    assert_eq!(probe.call_count(), 1);
    assert!(broker.acknowledged("pre-cancelled").is_empty());
    assert_eq!(broker.ready_count("pre-cancelled"), 3);
    assert_eq!(broker.open_connections(), 0);
}

#[tokio::test]
async fn test_cancelled_stop_succeeds_when_drain_completes() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("drained-anyway", 10).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "drained-anyway", 3);
    tokio::time::sleep(SETTLE).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_ok!(consumer.stop(&cancel).await);

    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);
    assert_eq!(broker.acknowledged("drained-anyway"), vec![0, 1, 2]);
    assert_eq!(consumer.state(), HandlerState::Stopped);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("restart", 2).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "restart", 2);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    consumer.stop(&CancellationToken::new()).await.unwrap();

    consumer.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(consumer.state(), HandlerState::Running);
    publish_many(&broker, "restart", 2);
    // New channel, tags start over.
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    consumer.dispose().await.unwrap();

    assert_eq!(broker.acknowledged("restart"), vec![0, 1, 0, 1]);
    assert_eq!(consumer.stats().batches_handled, 2);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (handler, _probe) = recording_handler();
    let (_broker, consumer) = ConsumerFactory::new("double-start", 2).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    let err = assert_err!(consumer.start(&CancellationToken::new()).await);
    assert_eq!(err.to_string(), "Cannot start consumer while it is running");

    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_start_fails_when_broker_refuses() {
    let (handler, _probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("refused", 2).build(handler);
    broker.set_fail_open(true);

    let err = assert_err!(consumer.start(&CancellationToken::new()).await);
    assert!(err.is_connection_fault());
    assert_eq!(consumer.state(), HandlerState::Stopped);

    broker.set_fail_open(false);
    assert_ok!(consumer.start(&CancellationToken::new()).await);
    assert_ok!(consumer.stop(&CancellationToken::new()).await);
}

#[tokio::test]
async fn test_stream_fault_is_reported_on_stop() {
    let (handler, probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("faulty", 10).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "faulty", 3);
    assert!(broker.inject_fault("faulty", "channel closed by broker"));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(consumer.state(), HandlerState::Stopped);

    let err = assert_err!(consumer.stop(&CancellationToken::new()).await);
    assert!(err.is_connection_fault());
    assert_eq!(probe.call_count(), 0);
    assert_eq!(consumer.state(), HandlerState::Stopped);
    assert_eq!(broker.ready_count("faulty"), 3);
}

#[tokio::test]
async fn test_ack_failure_ends_intake() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("ack-fail", 1).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    broker.set_fail_acks(true);
    publish_many(&broker, "ack-fail", 1);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0]);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(consumer.state(), HandlerState::Stopped);

    let err = assert_err!(consumer.stop(&CancellationToken::new()).await);
    assert!(err.is_connection_fault());
}

#[tokio::test]
async fn test_broker_side_cancel_is_reported_on_stop() {
    let (handler, _probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("broker-cancel", 10).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    assert!(broker.cancel_consumer("broker-cancel"));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(consumer.state(), HandlerState::Stopped);

    let err = assert_err!(consumer.stop(&CancellationToken::new()).await);
    assert!(err.to_string().contains("cancelled by the broker"));
}

#[tokio::test]
async fn test_start_after_fault_reconnects() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("recover", 3).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "recover", 2);
    assert!(broker.inject_fault("recover", "connection reset"));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(consumer.state(), HandlerState::Stopped);
    assert_eq!(broker.open_connections(), 1);

    assert_ok!(consumer.start(&CancellationToken::new()).await);
    assert_eq!(consumer.state(), HandlerState::Running);
    assert_eq!(broker.open_connections(), 1);

    publish_many(&broker, "recover", 1);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);

    assert_ok!(consumer.stop(&CancellationToken::new()).await);
    assert_eq!(broker.acknowledged("recover"), vec![0, 1, 2]);
    assert_eq!(broker.open_connections(), 0);
}

#[tokio::test]
async fn test_drop_running_consumer_releases_connection() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("dropped", 10).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "dropped", 2);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(broker.open_connections(), 1);

    drop(consumer);

    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(broker.open_connections(), 0);
    assert_eq!(broker.acknowledged("dropped"), vec![0, 1]);
}
