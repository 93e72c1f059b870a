//! # Document Processor
//!
//! Handles one inbound message end to end:
//!
//! ```text
//! parse -> fetch -> OCR -> delete temp file -> publish (only if text is non-empty)
//! ```
//!
//! Every failure is logged and reported as a [`ProcessOutcome`]; nothing is
//! propagated, so the consumer loop always moves on to the next message.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use super::stats::WorkerStats;
use crate::logging::{log_error, log_message_outcome};
use crate::messaging::{codec, BrokerConnection, ExtractionResult, ResultPublisher};
use crate::ocr::OcrEngine;
use crate::storage::ObjectStoreClient;

/// How one message ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Text extracted and accepted by the broker
    Published,
    /// OCR produced no text; nothing to report
    EmptyResult,
    /// Body did not follow the wire format
    Rejected,
    /// Object missing or transfer failed
    FetchFailed,
    /// Text extracted but the broker did not take the result
    PublishFailed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::EmptyResult => "empty_result",
            Self::Rejected => "rejected",
            Self::FetchFailed => "fetch_failed",
            Self::PublishFailed => "publish_failed",
        }
    }
}

impl std::fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs the fetch, OCR and publish stages for a single message
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    storage: ObjectStoreClient,
    ocr: OcrEngine,
    publisher: ResultPublisher,
    stats: Arc<WorkerStats>,
}

impl DocumentProcessor {
    pub fn new(
        storage: ObjectStoreClient,
        ocr: OcrEngine,
        publisher: ResultPublisher,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            storage,
            ocr,
            publisher,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    pub async fn process(&self, connection: &BrokerConnection, body: &[u8]) -> ProcessOutcome {
        let started = Instant::now();

        let item = match codec::parse(body) {
            Ok(item) => item,
            Err(e) => {
                WorkerStats::incr(&self.stats.rejected);
                warn!(
                    error = %e,
                    body_bytes = body.len(),
                    "Invalid message received, discarding"
                );
                return self.finish(None, ProcessOutcome::Rejected, started);
            }
        };

        info!(
            document_id = %item.document_id,
            object_key = %item.object_key,
            "Received work item"
        );

        let document = match self.storage.fetch(&item.object_key).await {
            Ok(document) => document,
            Err(e) => {
                WorkerStats::incr(&self.stats.fetch_failures);
                log_error(
                    "object_store",
                    "fetch",
                    &e.to_string(),
                    Some(&format!(
                        "document_id={} bucket={} key={}",
                        item.document_id,
                        self.storage.bucket(),
                        item.object_key
                    )),
                );
                return self.finish(Some(&item.document_id), ProcessOutcome::FetchFailed, started);
            }
        };

        let text = self.ocr.extract(document.path()).await;

        let document_path = document.to_path_buf();
        if let Err(e) = document.release() {
            warn!(
                document_id = %item.document_id,
                path = %document_path.display(),
                error = %e,
                "Failed to delete downloaded document"
            );
        }

        if text.is_empty() {
            WorkerStats::incr(&self.stats.empty_results);
            info!(
                document_id = %item.document_id,
                "OCR produced no text, nothing to publish"
            );
            return self.finish(Some(&item.document_id), ProcessOutcome::EmptyResult, started);
        }

        let result = ExtractionResult::new(item.document_id, text);
        match self.publisher.publish(connection, &result).await {
            Ok(()) => {
                WorkerStats::incr(&self.stats.published);
                info!(
                    document_id = %result.document_id,
                    queue = %self.publisher.queue(),
                    chars = result.text.len(),
                    "Sent result"
                );
                self.finish(Some(&result.document_id), ProcessOutcome::Published, started)
            }
            Err(e) => {
                WorkerStats::incr(&self.stats.publish_failures);
                error!(
                    document_id = %result.document_id,
                    queue = %self.publisher.queue(),
                    error = %e,
                    "Failed to publish extraction result"
                );
                self.finish(Some(&result.document_id), ProcessOutcome::PublishFailed, started)
            }
        }
    }

    fn finish(
        &self,
        document_id: Option<&str>,
        outcome: ProcessOutcome,
        started: Instant,
    ) -> ProcessOutcome {
        log_message_outcome(
            document_id,
            outcome.as_str(),
            started.elapsed().as_millis() as u64,
            None,
        );
        outcome
    }
}
