//! # OCR Engine
//!
//! Drives a [`PageRasterizer`] and a [`TextRecognitionEngine`] over every page
//! of a document, in page order.
//!
//! For each page a fresh temp PNG is reserved, rendered, recognized and then
//! deleted before the next page starts. The first failing page stops the run;
//! whatever text was gathered up to that point is returned and the failure is
//! logged. Extraction never returns an error to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::rasterizer::PageRasterizer;
use super::recognition::TextRecognitionEngine;
use super::{OcrError, OcrResult};
use crate::constants::ocr::{DEFAULT_DPI, PAGE_TEMP_PREFIX, PAGE_TEMP_SUFFIX};
use crate::storage::TempResource;

/// Page-by-page OCR over injected capabilities
#[derive(Clone)]
pub struct OcrEngine {
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn TextRecognitionEngine>,
    dpi: u32,
    temp_dir: Option<PathBuf>,
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("rasterizer", &self.rasterizer.name())
            .field("recognizer", &self.recognizer.name())
            .field("dpi", &self.dpi)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl OcrEngine {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn TextRecognitionEngine>,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            dpi: DEFAULT_DPI,
            temp_dir: None,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Directory for page images (system temp dir when `None`)
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Extract the text of every page, concatenated in page order
    ///
    /// Returns the partial (possibly empty) text when a page fails.
    pub async fn extract(&self, document: &Path) -> String {
        let started = Instant::now();
        let mut text = String::new();

        match self.extract_into(document, &mut text).await {
            Ok(pages) => info!(
                document = %document.display(),
                pages = pages,
                chars = text.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "OCR completed"
            ),
            Err(e) => error!(
                document = %document.display(),
                error = %e,
                partial_chars = text.len(),
                "Error during OCR processing, returning partial text"
            ),
        }

        text
    }

    async fn extract_into(&self, document: &Path, buffer: &mut String) -> OcrResult<usize> {
        let pages = self.rasterizer.page_count(document).await?;
        debug!(document = %document.display(), pages = pages, "Document opened for OCR");

        for page in 0..pages {
            let image = TempResource::reserve(self.temp_dir.as_deref(), PAGE_TEMP_PREFIX, PAGE_TEMP_SUFFIX)
                .map_err(|e| OcrError::temp_file(format!("page {page}: {e}")))?;

            let outcome = self.recognize_page(document, page, image.path()).await;

            let image_path = image.to_path_buf();
            if let Err(e) = image.release() {
                warn!(
                    page = page,
                    path = %image_path.display(),
                    error = %e,
                    "Failed to delete page image"
                );
            }

            buffer.push_str(&outcome?);
        }

        Ok(pages)
    }

    async fn recognize_page(&self, document: &Path, page: usize, image: &Path) -> OcrResult<String> {
        self.rasterizer
            .rasterize_page(document, page, self.dpi, image)
            .await?;

        let text = self
            .recognizer
            .recognize(image)
            .await
            .map_err(|e| OcrError::recognition(page, e.to_string()))?;

        debug!(page = page, chars = text.len(), "Page recognized");
        Ok(text)
    }
}
