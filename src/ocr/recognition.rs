//! Text recognition on a single raster image.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::process;
use super::OcrResult;
use crate::constants::ocr::{DEFAULT_LANGUAGE, DEFAULT_TESSERACT_PROGRAM};

/// Reads text off an image
#[async_trait]
pub trait TextRecognitionEngine: Send + Sync + 'static {
    async fn recognize(&self, image: &Path) -> OcrResult<String>;

    fn name(&self) -> &'static str;
}

/// Tesseract via its command-line interface: `tesseract <image> stdout -l <lang>`
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    language: String,
    timeout: Option<Duration>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new(DEFAULT_TESSERACT_PROGRAM, DEFAULT_LANGUAGE)
    }
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl TextRecognitionEngine for TesseractCli {
    async fn recognize(&self, image: &Path) -> OcrResult<String> {
        let output = process::run(
            &self.program,
            [
                image.as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(&self.language),
            ],
            self.timeout,
        )
        .await?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrError;

    #[test]
    fn test_default_language_is_english() {
        assert_eq!(TesseractCli::default().language(), "eng");
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let engine = TesseractCli::new("definitely-not-tesseract", "eng");
        let err = engine.recognize(Path::new("/nonexistent.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::Spawn { .. }));
    }

    #[tokio::test]
    #[ignore = "requires tesseract installed"]
    async fn test_tesseract_blank_page_has_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("blank.png");
        process::run(
            "magick",
            ["-size", "600x200", "xc:white", image.to_str().unwrap()],
            None,
        )
        .await
        .unwrap();

        let text = TesseractCli::default().recognize(&image).await.unwrap();
        assert!(text.trim().is_empty());
    }
}
