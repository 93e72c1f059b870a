//! Result publishing to the outbound queue.

use tracing::debug;

use super::codec::ExtractionResult;
use super::connector::BrokerConnection;
use super::MessagingResult;
use crate::constants::queues::OCR_RESULT_QUEUE;

/// Publishes extraction results to `ocr_result_queue`
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    queue: String,
}

impl Default for ResultPublisher {
    fn default() -> Self {
        Self::new(OCR_RESULT_QUEUE)
    }
}

impl ResultPublisher {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Encode `result` as `"{id}|{text}"` and publish it
    ///
    /// Fire-and-forget: success means the broker accepted the frame, not that
    /// anyone consumed it.
    pub async fn publish(
        &self,
        connection: &BrokerConnection,
        result: &ExtractionResult,
    ) -> MessagingResult<()> {
        let body = result.to_bytes();
        connection.publish(&self.queue, &body).await?;
        debug!(
            queue = %self.queue,
            document_id = %result.document_id,
            bytes = body.len(),
            "Published extraction result"
        );
        Ok(())
    }
}
