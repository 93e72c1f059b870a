//! # Worker
//!
//! The OCR worker proper: the consumer lifecycle, the per-message processor,
//! process-wide counters and the wiring from configuration.

pub mod bootstrap;
pub mod lifecycle;
pub mod processor;
pub mod stats;

pub use bootstrap::WorkerBootstrap;
pub use lifecycle::{LifecycleState, ShutdownHandle, WorkerLifecycle};
pub use processor::{DocumentProcessor, ProcessOutcome};
pub use stats::{WorkerStats, WorkerStatsSnapshot};
