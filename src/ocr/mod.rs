//! # OCR
//!
//! Page-by-page text extraction. A [`PageRasterizer`] turns each page of a
//! document into a temporary PNG at a fixed DPI, a [`TextRecognitionEngine`]
//! reads the text off that image, and [`OcrEngine`] drives the two in page
//! order, deleting each page image before moving on.

pub mod engine;
mod process;
pub mod rasterizer;
pub mod recognition;

pub use engine::OcrEngine;
pub use rasterizer::{ImageMagickRasterizer, PageRasterizer};
pub use recognition::{TesseractCli, TextRecognitionEngine};

use thiserror::Error;

/// OCR error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    #[error("Failed to start '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("'{program}' exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("Rasterization failed for page {page}: {message}")]
    Rasterization { page: usize, message: String },

    #[error("Recognition failed for page {page}: {message}")]
    Recognition { page: usize, message: String },

    #[error("Unreadable document: {message}")]
    InvalidDocument { message: String },

    #[error("Temporary image error: {message}")]
    TempFile { message: String },
}

impl OcrError {
    pub fn spawn(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn rasterization(page: usize, message: impl Into<String>) -> Self {
        Self::Rasterization {
            page,
            message: message.into(),
        }
    }

    pub fn recognition(page: usize, message: impl Into<String>) -> Self {
        Self::Recognition {
            page,
            message: message.into(),
        }
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    pub fn temp_file(message: impl Into<String>) -> Self {
        Self::TempFile {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for OcrError {
    fn from(err: std::io::Error) -> Self {
        OcrError::temp_file(err.to_string())
    }
}

pub type OcrResult<T> = Result<T, OcrError>;
