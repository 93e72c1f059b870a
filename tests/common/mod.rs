//! Shared harness for integration tests: a worker wired to the in-memory broker,
//! the in-memory object store and the plain-text OCR doubles.

pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use ocr_worker::messaging::providers::InMemoryBroker;
use ocr_worker::messaging::{BrokerConnector, ResultPublisher};
use ocr_worker::ocr::{OcrEngine, PageRasterizer};
use ocr_worker::resilience::RetryPolicy;
use ocr_worker::storage::{InMemoryObjectStore, ObjectStoreClient};
use ocr_worker::testing::{EchoRecognizer, PlainTextRasterizer};
use ocr_worker::worker::{DocumentProcessor, WorkerLifecycle, WorkerStats};
use ocr_worker::{Result, WorkerStatsSnapshot};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const BUCKET: &str = "documents";

pub struct WorkerHarness {
    pub broker: InMemoryBroker,
    pub store: InMemoryObjectStore,
    pub recognizer: EchoRecognizer,
    pub temp_dir: TempDir,
    pub policy: RetryPolicy,
}

impl WorkerHarness {
    pub fn new() -> Self {
        Self::with_recognizer(EchoRecognizer::new())
    }

    pub fn with_recognizer(recognizer: EchoRecognizer) -> Self {
        Self {
            broker: InMemoryBroker::new(),
            store: InMemoryObjectStore::new(),
            recognizer,
            temp_dir: TempDir::new().expect("temp dir"),
            policy: RetryPolicy::new(5, Duration::from_millis(10)),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn worker(&self) -> WorkerLifecycle {
        self.worker_with_rasterizer(Arc::new(PlainTextRasterizer))
    }

    /// Worker whose pages come from `rasterizer` instead of the stored document
    pub fn worker_with_rasterizer(&self, rasterizer: Arc<dyn PageRasterizer>) -> WorkerLifecycle {
        let temp_dir = Some(self.temp_dir.path().to_path_buf());
        let connector = BrokerConnector::new(Arc::new(self.broker.clone()), self.policy);
        let storage = ObjectStoreClient::new(Arc::new(self.store.clone()), BUCKET)
            .with_temp_dir(temp_dir.clone());
        let ocr = OcrEngine::new(rasterizer, Arc::new(self.recognizer.clone()))
            .with_temp_dir(temp_dir);
        let processor = DocumentProcessor::new(
            storage,
            ocr,
            ResultPublisher::default(),
            Arc::new(WorkerStats::default()),
        );
        WorkerLifecycle::new(connector, processor)
    }

    pub fn put_document(&self, key: &str, pages: &[&str]) {
        let separator = PlainTextRasterizer::PAGE_BREAK.to_string();
        self.store
            .put(BUCKET, key, pages.join(separator.as_str()).as_bytes());
    }

    pub fn temp_entries(&self) -> usize {
        ocr_worker::testing::count_entries(self.temp_dir.path())
    }
}

/// Start `worker` on its own task
pub fn spawn(worker: WorkerLifecycle) -> (Arc<WorkerLifecycle>, JoinHandle<Result<WorkerStatsSnapshot>>) {
    let worker = Arc::new(worker);
    let running = Arc::clone(&worker);
    let handle = tokio::spawn(async move { running.run().await });
    (worker, handle)
}

/// Poll `condition` until it holds, panicking after 2s
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: FnMut() -> bool,
{
    wait_until_within(what, Duration::from_secs(2), condition).await;
}

/// Poll `condition` every 5ms until it holds, panicking once `budget` has elapsed
///
/// Under paused time each poll advances the clock by only 5ms, so callers
/// waiting on long timers must pass a budget that covers them.
pub async fn wait_until_within<F>(what: &str, budget: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + budget;
    loop {
        if condition() {
            return;
        }
        if Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
