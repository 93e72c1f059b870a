#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, MinIO in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # OCR Worker
//!
//! Queue-driven text extraction for uploaded documents.
//!
//! ## Overview
//!
//! The worker consumes `<documentId>|<objectKey>` work items from the
//! `document_queue`, downloads the referenced document from the `documents`
//! bucket, extracts its text page by page (300 DPI rasterization followed by
//! English OCR), and publishes `<documentId>|<extractedText>` to the
//! `ocr_result_queue`.
//!
//! ## Processing Model
//!
//! - **Serialized handling**: one delivery is fully handled before the next is pulled
//! - **Failure isolation**: a bad message, missing object, OCR failure or handler
//!   panic affects only that message
//! - **At-most-once**: deliveries are auto-acknowledged by default
//! - **No leaks**: downloaded documents and page images are removed on every path
//!
//! ## Module Organization
//!
//! - [`messaging`] - Wire codec, broker connector, result publisher and providers
//! - [`storage`] - Object store client and temporary file handling
//! - [`ocr`] - Page rasterization and text recognition
//! - [`worker`] - Consumer lifecycle and per-message processing
//! - [`resilience`] - Bounded retry for the startup connect
//! - [`config`] - Layered configuration loading
//! - [`logging`] - Tracing subscriber setup and structured log helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_worker::{ConfigLoader, WorkerBootstrap};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let worker = WorkerBootstrap::bootstrap(&config)?;
//!
//! let shutdown = worker.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.shutdown();
//! });
//!
//! let stats = worker.run().await?;
//! println!("published {}", stats.published);
//! # Ok(())
//! # }
//! ```
//!
//! Enable the `test-utils` feature for the scripted OCR doubles in `testing`,
//! which together with the in-memory broker and object store run the whole
//! pipeline without external services.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod ocr;
pub mod resilience;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod worker;

pub use config::{ConfigLoader, ConfigurationError, WorkerConfig};
pub use error::{Result, WorkerError};
pub use messaging::{BrokerConnection, BrokerConnector, ExtractionResult, WorkItem};
pub use worker::{DocumentProcessor, WorkerBootstrap, WorkerLifecycle, WorkerStatsSnapshot};
