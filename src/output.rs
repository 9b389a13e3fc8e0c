//! Result types of an extraction run.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one guidebook page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Characters of recognised text fed to the extractor.
    pub text_chars: usize,
    /// Routes found on the page (0 when skipped).
    pub routes: usize,
    /// Whether `page_{N}.json` was written by this run. An existing fragment
    /// is never overwritten.
    pub fragment_written: bool,
    /// Model retries used.
    pub retries: u8,
    pub duration_ms: u64,
    /// Set when the page was skipped.
    pub error: Option<PageError>,
}

impl PageOutcome {
    pub(crate) fn skipped(page_num: usize, text_chars: usize, error: PageError) -> Self {
        Self {
            page_num,
            text_chars,
            routes: 0,
            fragment_written: false,
            retries: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }
}

/// Totals for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the guidebook.
    pub total_pages: usize,
    /// Pages that yielded routes.
    pub extracted_pages: usize,
    /// Pages skipped after a page-level failure.
    pub skipped_pages: usize,
    /// Routes found across all extracted pages.
    pub total_routes: usize,
    /// Page images rendered by this run (existing images are reused).
    pub rendered_images: usize,
    pub total_duration_ms: u64,
}

/// Everything an extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Folder holding `page_{N}.png`, `.txt` and `.json` for this guidebook.
    pub folder: PathBuf,
    /// Per-page outcomes, in page order.
    pub pages: Vec<PageOutcome>,
    pub stats: ExtractionStats,
}
