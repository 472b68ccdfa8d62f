//! Count-triggered batching

use crate::common::{ConsumerFactory, SETTLE, WAIT, publish_many, recording_handler};
use amqp_batch_consumer::HandlerState;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_batches_are_exactly_prefetch_sized() {
    let cases: [(u16, usize); 6] = [(1, 10), (5, 47), (10, 185), (16, 200), (20, 310), (25, 400)];

    for (prefetch, count) in cases {
        let queue = format!("batching.{prefetch}.{count}");
        let (handler, mut probe) = recording_handler();
        let (broker, consumer) = ConsumerFactory::new(&queue, prefetch)
            .drain_on_stop(false)
            .build(handler);

        consumer.start(&CancellationToken::new()).await.unwrap();
        publish_many(&broker, &queue, count);

        let prefetch = usize::from(prefetch);
        let expected_batches = count / prefetch;
        for _ in 0..expected_batches {
            let batch = probe.next_batch(WAIT).await.expect("batch not delivered");
            assert_eq!(batch.len(), prefetch, "queue {queue}");
        }
        tokio::time::sleep(SETTLE).await;
        assert!(probe.try_next_batch().is_none(), "queue {queue}");
        assert_eq!(probe.call_count(), expected_batches);

        let flattened: Vec<u64> = probe.calls().into_iter().flatten().collect();
        let expected: Vec<u64> = (0..(expected_batches * prefetch) as u64).collect();
        assert_eq!(flattened, expected);

        consumer.stop(&CancellationToken::new()).await.unwrap();
        assert_eq!(broker.acknowledged(&queue), expected);
        assert_eq!(broker.ready_count(&queue), count % prefetch);
        assert_eq!(consumer.stats().deliveries_discarded, (count % prefetch) as u64);
    }
}

#[tokio::test]
async fn test_prefetch_of_one_yields_singletons() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("singletons", 1).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "singletons", 10);

    for tag in 0..10u64 {
        assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![tag]);
    }

    consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.acknowledged("singletons"), (0..10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_full_batch_acknowledged_in_order() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("five", 5).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "five", 5);

    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2, 3, 4]);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(broker.acknowledged("five"), vec![0, 1, 2, 3, 4]);
    assert_eq!(broker.unacked_count("five"), 0);

    consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(probe.call_count(), 1);
}

#[tokio::test]
async fn test_partial_batch_waits_for_more_deliveries() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("partial", 5).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    publish_many(&broker, "partial", 3);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(probe.call_count(), 0);

    publish_many(&broker, "partial", 2);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2, 3, 4]);

    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_backlog_published_before_start_is_batched() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("backlog", 4).build(handler);
    publish_many(&broker, "backlog", 8);

    consumer.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![4, 5, 6, 7]);

    consumer.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_handler_failure_leaves_batch_unacknowledged() {
    let (handler, mut probe) = recording_handler();
    let (broker, consumer) = ConsumerFactory::new("failing", 5).build(handler);

    consumer.start(&CancellationToken::new()).await.unwrap();
    probe.set_failing(true);
    publish_many(&broker, "failing", 5);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2, 3, 4]);
    tokio::time::sleep(SETTLE).await;

    assert!(broker.acknowledged("failing").is_empty());
    assert_eq!(consumer.state(), HandlerState::Running);
    assert_eq!(consumer.stats().batches_failed, 1);

    // The failed batch still occupies the whole prefetch window.
    publish_many(&broker, "failing", 5);
    tokio::time::sleep(SETTLE).await;
    assert!(probe.try_next_batch().is_none());
    assert_eq!(broker.unacked_count("failing"), 5);
    assert_eq!(broker.ready_count("failing"), 5);

    consumer.stop(&CancellationToken::new()).await.unwrap();
    // Closing the channel hands the failed batch back to the broker.
    assert_eq!(broker.ready_count("failing"), 10);

    probe.set_failing(false);
    consumer.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(probe.next_batch(WAIT).await.unwrap(), vec![5, 6, 7, 8, 9]);

    consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.acknowledged("failing"), (0..10).collect::<Vec<u64>>());
    assert_eq!(broker.ready_count("failing"), 0);
}

#[tokio::test]
async fn test_consumers_on_different_queues_are_independent() {
    let (orders_handler, mut orders) = recording_handler();
    let (invoices_handler, mut invoices) = recording_handler();
    let (broker, orders_consumer) = ConsumerFactory::new("orders", 2).build(orders_handler);
    let (_, invoices_consumer) = ConsumerFactory::new("invoices", 3)
        .broker(&broker)
        .build(invoices_handler);

    orders_consumer.start(&CancellationToken::new()).await.unwrap();
    invoices_consumer.start(&CancellationToken::new()).await.unwrap();

    publish_many(&broker, "orders", 2);
    publish_many(&broker, "invoices", 3);

    assert_eq!(orders.next_batch(WAIT).await.unwrap(), vec![0, 1]);
    assert_eq!(invoices.next_batch(WAIT).await.unwrap(), vec![0, 1, 2]);

    orders_consumer.stop(&CancellationToken::new()).await.unwrap();
    invoices_consumer.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.acknowledged("orders"), vec![0, 1]);
    assert_eq!(broker.acknowledged("invoices"), vec![0, 1, 2]);
}
