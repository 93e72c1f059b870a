//! End-to-end message handling against the in-memory broker and object store

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{spawn, wait_until, WorkerHarness};
use futures::StreamExt;
use ocr_worker::constants::queues::{DOCUMENT_QUEUE, OCR_RESULT_QUEUE};
use ocr_worker::messaging::{AckMode, BrokerChannel, ChannelFactory};
use ocr_worker::testing::{EchoRecognizer, StaticRasterizer};
use ocr_worker::worker::LifecycleState;
use ocr_worker::WorkerError;

async fn wait_for_consumer(harness: &WorkerHarness) {
    wait_until("consumer on document_queue", || {
        harness.broker.has_consumer(DOCUMENT_QUEUE)
    })
    .await;
}

#[tokio::test]
async fn test_document_text_is_published_once() {
    let harness = WorkerHarness::new();
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;
    assert_eq!(worker.state(), LifecycleState::Running);

    harness.broker.inject(DOCUMENT_QUEUE, b"42|K").unwrap();
    wait_until("result published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;

    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"42|Hello".to_vec()]
    );
    assert_eq!(stats.received, 1);
    assert_eq!(stats.published, 1);
    assert_eq!(harness.temp_entries(), 0);
    assert_eq!(worker.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_missing_object_does_not_stop_the_worker() {
    let harness = WorkerHarness::new();
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"1|missing").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"2|K").unwrap();
    wait_until("second result published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;

    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"2|Hello".to_vec()]
    );
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(
        harness.store.requests(),
        vec!["documents/missing".to_string(), "documents/K".to_string()]
    );
    assert_eq!(harness.temp_entries(), 0);
}

#[tokio::test]
async fn test_pages_are_concatenated_in_order() {
    let harness = WorkerHarness::new();
    harness.put_document("scan.pdf", &["A", "B", "C"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"7|scan.pdf").unwrap();
    wait_until("result published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;

    worker.shutdown_handle().shutdown();
    run.await.unwrap().unwrap();

    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"7|ABC".to_vec()]
    );

    // Downloaded document plus the current page image, never more
    let seen = harness.recognizer.seen();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|image| image.files_in_dir == 2));
    assert_eq!(harness.temp_entries(), 0);
}

#[tokio::test]
async fn test_malformed_messages_are_discarded() {
    let harness = WorkerHarness::new();
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    for body in [
        &b"no delimiter"[..],
        b"a|b|c",
        b"",
        &[0xff, 0xfe, b'|', b'k'],
    ] {
        harness.broker.inject(DOCUMENT_QUEUE, body).unwrap();
    }
    harness.broker.inject(DOCUMENT_QUEUE, b"5|K").unwrap();

    wait_until("valid message published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;
    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(stats.rejected, 4);
    assert_eq!(harness.store.requests(), vec!["documents/K".to_string()]);
    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"5|Hello".to_vec()]
    );
}

#[tokio::test]
async fn test_empty_text_is_not_published() {
    let harness = WorkerHarness::new();
    harness.put_document("blank", &["", ""]);
    harness.store.put("documents", "garbage", &[0xff, 0x00, 0xfe]);
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"1|blank").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"2|garbage").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"3|K").unwrap();

    wait_until("last message published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;
    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(stats.empty_results, 2);
    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"3|Hello".to_vec()]
    );
    assert_eq!(harness.temp_entries(), 0);
}

#[tokio::test]
async fn test_result_text_is_not_escaped() {
    let harness = WorkerHarness::new();
    harness.put_document("pipes", &["a|b"]);
    harness.put_document("space", &[" "]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"4|pipes").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"9|space").unwrap();
    wait_until("both results published", || {
        harness.broker.published(OCR_RESULT_QUEUE).len() == 2
    })
    .await;
    worker.shutdown_handle().shutdown();
    run.await.unwrap().unwrap();

    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"4|a|b".to_vec(), b"9| ".to_vec()]
    );
}

#[tokio::test]
async fn test_handler_panic_is_isolated() {
    let harness = WorkerHarness::with_recognizer(EchoRecognizer::new().panicking_on("boom"));
    harness.put_document("bad", &["boom"]);
    harness.put_document("good", &["fine"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"1|bad").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"2|good").unwrap();
    wait_until("good document published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;
    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(stats.panics, 1);
    assert_eq!(stats.received, 2);
    assert_eq!(
        harness.broker.published(OCR_RESULT_QUEUE),
        vec![b"2|fine".to_vec()]
    );
    assert_eq!(harness.temp_entries(), 0);
}

#[tokio::test]
async fn test_auto_ack_leaves_nothing_unacknowledged() {
    let harness = WorkerHarness::new();
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"1|K").unwrap();
    wait_until("result published", || {
        !harness.broker.published(OCR_RESULT_QUEUE).is_empty()
    })
    .await;

    assert_eq!(harness.broker.unacked_count(DOCUMENT_QUEUE), 0);
    assert!(harness.broker.acked(DOCUMENT_QUEUE).is_empty());

    worker.shutdown_handle().shutdown();
    run.await.unwrap().unwrap();
}

/// Start a worker whose OCR never finishes, hand it one message and kill it mid-document
async fn kill_worker_mid_document(harness: &WorkerHarness, ack_mode: AckMode) {
    harness.put_document("K", &["Hello"]);
    let rasterizer = StaticRasterizer::new(["Hello"]).with_page_delays([Duration::from_secs(3600)]);

    let (_worker, run) = spawn(
        harness
            .worker_with_rasterizer(Arc::new(rasterizer))
            .with_ack_mode(ack_mode),
    );
    wait_for_consumer(harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"1|K").unwrap();
    wait_until("document fetched", || !harness.store.requests().is_empty()).await;

    // Process death: the task goes away and the broker sees the connection drop
    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());
    harness.broker.close_from_server();
}

#[tokio::test]
async fn test_auto_ack_loses_message_in_flight_at_crash() {
    let harness = WorkerHarness::new();

    kill_worker_mid_document(&harness, AckMode::Auto).await;

    assert_eq!(harness.broker.ready_count(DOCUMENT_QUEUE), 0);
    assert_eq!(harness.broker.unacked_count(DOCUMENT_QUEUE), 0);
    assert!(harness.broker.published(OCR_RESULT_QUEUE).is_empty());

    // A restarted worker has nothing to redo
    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;
    worker.shutdown_handle().shutdown();
    let stats = run.await.unwrap().unwrap();
    assert_eq!(stats.received, 0);
}

#[tokio::test]
async fn test_after_processing_requeues_message_in_flight_at_crash() {
    let harness = WorkerHarness::new();

    kill_worker_mid_document(&harness, AckMode::AfterProcessing).await;

    assert_eq!(harness.broker.ready_count(DOCUMENT_QUEUE), 1);
    assert_eq!(harness.broker.unacked_count(DOCUMENT_QUEUE), 0);
    assert!(harness.broker.published(OCR_RESULT_QUEUE).is_empty());

    let channel = harness.broker.open().await.unwrap();
    let mut deliveries = channel.subscribe(DOCUMENT_QUEUE, "inspect", true).await.unwrap();
    let delivery = deliveries.next().await.unwrap().unwrap();
    assert_eq!(delivery.body, b"1|K".to_vec());
    assert!(delivery.redelivered);
}

#[tokio::test]
async fn test_after_processing_mode_acks_every_message() {
    let harness = WorkerHarness::new();
    harness.put_document("K", &["Hello"]);

    let (worker, run) = spawn(harness.worker().with_ack_mode(AckMode::AfterProcessing));
    wait_for_consumer(&harness).await;

    harness.broker.inject(DOCUMENT_QUEUE, b"bad message").unwrap();
    harness.broker.inject(DOCUMENT_QUEUE, b"1|K").unwrap();
    wait_until("both messages acked", || {
        harness.broker.acked(DOCUMENT_QUEUE).len() == 2
    })
    .await;

    assert_eq!(harness.broker.unacked_count(DOCUMENT_QUEUE), 0);

    worker.shutdown_handle().shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_broker_side_close_ends_the_run() {
    let harness = WorkerHarness::new();

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    harness.broker.close_from_server();

    let result = run.await.unwrap();
    assert!(matches!(result, Err(WorkerError::ConnectionLost { .. })));
    assert_eq!(worker.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_shutdown_closes_the_connection() {
    let harness = WorkerHarness::new();

    let (worker, run) = spawn(harness.worker());
    wait_for_consumer(&harness).await;

    let handle = worker.shutdown_handle();
    handle.shutdown();
    handle.shutdown();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(stats.received, 0);
    assert_eq!(harness.broker.close_calls(), 1);
    assert_eq!(harness.broker.open_channels(), 0);
    assert!(!harness.broker.has_consumer(DOCUMENT_QUEUE));
}
