//! # Resilience Module
//!
//! Fault tolerance helpers for the worker's startup path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ocr_worker::resilience::{retry_with_delay, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new(5, Duration::from_secs(5));
//!
//! let value = retry_with_delay("broker_connect", &policy, None, |attempt| async move {
//!     // Open a connection here
//!     Ok::<u32, String>(attempt)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{retry_with_delay, RetryError, RetryPolicy};
