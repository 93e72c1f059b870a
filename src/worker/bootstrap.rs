//! # Worker Bootstrap
//!
//! Wires a [`WorkerLifecycle`] from a [`WorkerConfig`]: RabbitMQ for the broker,
//! S3/MinIO for documents, ImageMagick and Tesseract for OCR.
//! [`WorkerBootstrap::assemble`] takes the capabilities explicitly so the same
//! wiring can run against in-memory providers.

use std::sync::Arc;

use tracing::info;

use super::lifecycle::WorkerLifecycle;
use super::processor::DocumentProcessor;
use super::stats::WorkerStats;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::messaging::providers::rabbitmq::redact_url;
use crate::messaging::providers::RabbitMqChannelFactory;
use crate::messaging::{BrokerConnector, ChannelFactory, QueueSpec, ResultPublisher};
use crate::ocr::{
    ImageMagickRasterizer, OcrEngine, PageRasterizer, TesseractCli, TextRecognitionEngine,
};
use crate::storage::{ObjectStore, ObjectStoreClient, S3ObjectStore};

pub struct WorkerBootstrap;

impl WorkerBootstrap {
    /// Production wiring
    pub fn bootstrap(config: &WorkerConfig) -> Result<WorkerLifecycle> {
        let factory = RabbitMqChannelFactory::new(config.broker.url.clone());
        let store = S3ObjectStore::new(
            &config.object_store.endpoint,
            &config.object_store.region,
            &config.object_store.access_key,
            &config.object_store.secret_key,
        )?;
        let timeout = config.ocr.process_timeout();
        let rasterizer =
            ImageMagickRasterizer::new(config.ocr.magick_program.clone()).with_timeout(timeout);
        let recognizer = TesseractCli::new(
            config.ocr.tesseract_program.clone(),
            config.ocr.language.clone(),
        )
        .with_timeout(timeout);

        info!(
            broker = %redact_url(&config.broker.url),
            object_store = %config.object_store.endpoint,
            bucket = %config.object_store.bucket,
            dpi = config.ocr.dpi,
            language = %config.ocr.language,
            "Bootstrapping OCR worker"
        );

        Ok(Self::assemble(
            config,
            Arc::new(factory),
            Arc::new(store),
            Arc::new(rasterizer),
            Arc::new(recognizer),
        ))
    }

    /// Build the lifecycle around the given capabilities
    pub fn assemble(
        config: &WorkerConfig,
        factory: Arc<dyn ChannelFactory>,
        store: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn TextRecognitionEngine>,
    ) -> WorkerLifecycle {
        let connector = BrokerConnector::new(factory, config.broker.retry_policy()).with_queues(
            vec![
                QueueSpec::transient(&config.broker.document_queue),
                QueueSpec::transient(&config.broker.result_queue),
            ],
        );

        let storage = ObjectStoreClient::new(store, &config.object_store.bucket)
            .with_temp_dir(config.object_store.temp_dir.clone())
            .with_key_suffix(config.object_store.key_suffix.clone());

        let ocr = OcrEngine::new(rasterizer, recognizer)
            .with_dpi(config.ocr.dpi)
            .with_temp_dir(config.object_store.temp_dir.clone());

        let processor = DocumentProcessor::new(
            storage,
            ocr,
            ResultPublisher::new(&config.broker.result_queue),
            Arc::new(WorkerStats::default()),
        );

        WorkerLifecycle::new(connector, processor)
            .with_inbound_queue(&config.broker.document_queue)
            .with_ack_mode(config.worker.ack_mode)
    }
}
