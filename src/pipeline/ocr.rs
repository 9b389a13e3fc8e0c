//! Text recognition of page images.
//!
//! Recognition sits behind [`TextRecognizer`] so the run can be driven with
//! canned text in tests. The default [`TesseractCli`] shells out to the
//! `tesseract` executable and reads the text from its stdout.
//!
//! Recognised text is cached as `page_{N}.txt`; a cached page is never
//! recognised again.

use crate::error::{CroquiError, PageError};
use crate::route::{page_image_path, page_text_path};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Turns a page image into plain text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image_path: &Path, page_num: usize) -> Result<String, PageError>;
}

/// Runs `tesseract <image> stdout [-l <lang>]`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub binary: PathBuf,
    pub language: Option<String>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: None,
        }
    }
}

impl TesseractCli {
    pub fn new(language: Option<String>) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image_path: &Path, page_num: usize) -> Result<String, PageError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image_path).arg("stdout");
        if let Some(ref lang) = self.language {
            cmd.arg("-l").arg(lang);
        }

        let output = cmd.output().map_err(|e| PageError::OcrFailed {
            page: page_num,
            detail: format!("could not run {}: {e}", self.binary.display()),
        })?;

        if !output.status.success() {
            return Err(PageError::OcrFailed {
                page: page_num,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Text of page `page_num`: the cached `page_{N}.txt` when present,
/// otherwise freshly recognised and written to the cache.
///
/// The outer `Result` is fatal (cache not writable); the inner one is a
/// page-level failure.
pub async fn page_text(
    recognizer: &Arc<dyn TextRecognizer>,
    folder: &Path,
    page_num: usize,
) -> Result<Result<String, PageError>, CroquiError> {
    let text_path = page_text_path(folder, page_num as u32);
    if let Ok(text) = tokio::fs::read_to_string(&text_path).await {
        debug!("Page {}: using cached text {}", page_num, text_path.display());
        return Ok(Ok(text));
    }

    let image_path = page_image_path(folder, page_num as u32);
    if !image_path.is_file() {
        return Ok(Err(PageError::ImageUnavailable {
            page: page_num,
            detail: format!("{} not found", image_path.display()),
        }));
    }

    let recognizer = Arc::clone(recognizer);
    let text = match tokio::task::spawn_blocking(move || recognizer.recognize(&image_path, page_num))
        .await
        .map_err(|e| CroquiError::Internal(format!("OCR task panicked: {e}")))?
    {
        Ok(text) => text,
        Err(e) => return Ok(Err(e)),
    };

    tokio::fs::write(&text_path, &text)
        .await
        .map_err(|source| CroquiError::OutputWriteFailed {
            path: text_path.clone(),
            source,
        })?;
    debug!("Page {}: recognised {} chars", page_num, text.len());
    Ok(Ok(text))
}
