//! Page rasterization.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::process;
use super::{OcrError, OcrResult};
use crate::constants::ocr::DEFAULT_MAGICK_PROGRAM;

/// Renders document pages to raster images
#[async_trait]
pub trait PageRasterizer: Send + Sync + 'static {
    /// Number of pages (frames) in the document. Always at least one on success.
    async fn page_count(&self, document: &Path) -> OcrResult<usize>;

    /// Render page `page_index` (0-based) at `dpi` as PNG into `output`
    async fn rasterize_page(
        &self,
        document: &Path,
        page_index: usize,
        dpi: u32,
        output: &Path,
    ) -> OcrResult<()>;

    fn name(&self) -> &'static str;
}

/// Rasterizer backed by the ImageMagick 7 `magick` CLI
///
/// PDF input additionally needs Ghostscript on the host.
#[derive(Debug, Clone)]
pub struct ImageMagickRasterizer {
    program: String,
    timeout: Option<Duration>,
}

impl Default for ImageMagickRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAGICK_PROGRAM)
    }
}

impl ImageMagickRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn page_spec(document: &Path, page_index: usize) -> String {
        format!("{}[{}]", document.display(), page_index)
    }
}

/// Count frames in `magick identify -format "%p\n"` output
fn count_frames(stdout: &str) -> usize {
    stdout.lines().filter(|line| !line.trim().is_empty()).count()
}

#[async_trait]
impl PageRasterizer for ImageMagickRasterizer {
    async fn page_count(&self, document: &Path) -> OcrResult<usize> {
        let output = process::run(
            &self.program,
            [
                OsStr::new("identify"),
                OsStr::new("-format"),
                OsStr::new("%p\\n"),
                document.as_os_str(),
            ],
            self.timeout,
        )
        .await
        .map_err(|e| OcrError::invalid_document(e.to_string()))?;

        match count_frames(&String::from_utf8_lossy(&output.stdout)) {
            0 => Err(OcrError::invalid_document(format!(
                "no pages found in {}",
                document.display()
            ))),
            pages => Ok(pages),
        }
    }

    async fn rasterize_page(
        &self,
        document: &Path,
        page_index: usize,
        dpi: u32,
        output: &Path,
    ) -> OcrResult<()> {
        let density = dpi.to_string();
        let input = Self::page_spec(document, page_index);
        let target = format!("png:{}", output.display());

        process::run(
            &self.program,
            ["-density", density.as_str(), input.as_str(), target.as_str()],
            self.timeout,
        )
        .await
        .map_err(|e| OcrError::rasterization(page_index, e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "imagemagick"
    }
}
