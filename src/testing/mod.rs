//! # Test Doubles
//!
//! Scripted OCR capabilities for unit and integration tests. Together with
//! [`InMemoryBroker`](crate::messaging::providers::InMemoryBroker) and
//! [`InMemoryObjectStore`](crate::storage::InMemoryObjectStore) they let the
//! whole pipeline run without RabbitMQ, MinIO, ImageMagick or Tesseract.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ocr::{OcrError, OcrResult, PageRasterizer, TextRecognitionEngine};

/// Rasterizer that "renders" each page by writing its scripted text to the image file
#[derive(Debug, Clone, Default)]
pub struct StaticRasterizer {
    pages: Vec<String>,
    delays: Vec<Duration>,
    failing_page: Option<usize>,
    unreadable: bool,
}

impl StaticRasterizer {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A document that cannot be opened at all
    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Default::default()
        }
    }

    /// Per-page rendering delays, by page index
    pub fn with_page_delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.delays = delays.into_iter().collect();
        self
    }

    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.failing_page = Some(page);
        self
    }
}

#[async_trait]
impl PageRasterizer for StaticRasterizer {
    async fn page_count(&self, document: &Path) -> OcrResult<usize> {
        if self.unreadable || self.pages.is_empty() {
            return Err(OcrError::invalid_document(format!(
                "cannot open {}",
                document.display()
            )));
        }
        Ok(self.pages.len())
    }

    async fn rasterize_page(
        &self,
        _document: &Path,
        page_index: usize,
        _dpi: u32,
        output: &Path,
    ) -> OcrResult<()> {
        if let Some(delay) = self.delays.get(page_index).copied() {
            tokio::time::sleep(delay).await;
        }
        if self.failing_page == Some(page_index) {
            return Err(OcrError::rasterization(page_index, "scripted failure"));
        }
        let text = self
            .pages
            .get(page_index)
            .ok_or_else(|| OcrError::rasterization(page_index, "page out of range"))?;
        tokio::fs::write(output, text).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Rasterizer over plain-text documents, one page per form-feed (`\x0c`) separated segment
///
/// Lets each stored document carry its own page texts, so one worker can be fed
/// documents with different content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRasterizer;

impl PlainTextRasterizer {
    pub const PAGE_BREAK: char = '\x0c';

    async fn pages(document: &Path) -> OcrResult<Vec<String>> {
        let bytes = tokio::fs::read(document).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            OcrError::invalid_document(format!("{} is not a text document", document.display()))
        })?;
        if text.is_empty() {
            return Err(OcrError::invalid_document(format!(
                "{} has no pages",
                document.display()
            )));
        }
        Ok(text.split(Self::PAGE_BREAK).map(str::to_string).collect())
    }
}

#[async_trait]
impl PageRasterizer for PlainTextRasterizer {
    async fn page_count(&self, document: &Path) -> OcrResult<usize> {
        Ok(Self::pages(document).await?.len())
    }

    async fn rasterize_page(
        &self,
        document: &Path,
        page_index: usize,
        _dpi: u32,
        output: &Path,
    ) -> OcrResult<()> {
        let pages = Self::pages(document).await?;
        let text = pages
            .get(page_index)
            .ok_or_else(|| OcrError::rasterization(page_index, "page out of range"))?;
        tokio::fs::write(output, text).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "plain_text"
    }
}

/// What [`EchoRecognizer`] saw for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenImage {
    pub path: PathBuf,
    /// Entries in the image's directory at recognition time
    pub files_in_dir: usize,
}

/// Recognizer that returns the image file's contents, or a fixed text
#[derive(Debug, Clone, Default)]
pub struct EchoRecognizer {
    fixed_text: Option<String>,
    fail: bool,
    panic_on: Option<String>,
    seen: Arc<Mutex<Vec<SeenImage>>>,
}

impl EchoRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `text` for every page regardless of the image
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            fixed_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Panic when the recognized text equals `text`
    pub fn panicking_on(mut self, text: impl Into<String>) -> Self {
        self.panic_on = Some(text.into());
        self
    }

    pub fn seen(&self) -> Vec<SeenImage> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl TextRecognitionEngine for EchoRecognizer {
    async fn recognize(&self, image: &Path) -> OcrResult<String> {
        let content = tokio::fs::read_to_string(image).await?;
        let files_in_dir = image.parent().map(count_entries).unwrap_or(0);
        self.seen.lock().push(SeenImage {
            path: image.to_path_buf(),
            files_in_dir,
        });

        if self.fail {
            return Err(OcrError::spawn("echo", "scripted failure"));
        }
        if self.panic_on.as_deref() == Some(content.as_str()) {
            panic!("scripted recognizer panic on {content:?}");
        }
        Ok(self.fixed_text.clone().unwrap_or(content))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Number of entries in `dir` (0 when it cannot be read)
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
