//! Error types for the croqui library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CroquiError`] — **Fatal**: the operation cannot proceed at all
//!   (missing guidebook PDF, malformed catalog fragment, output not
//!   writable). Returned as `Err(CroquiError)` from the top-level functions.
//!
//! * [`PageError`] — **Non-fatal**: a single guidebook page could not be
//!   turned into routes (OCR failure, unparseable model reply). Stored inside
//!   [`crate::output::PageOutcome`]; the run carries on with the next page.
//!
//! Export skips (missing or corrupt page image) never surface as errors at
//! all; they are logged and the page is left out of the PDF.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the croqui library.
#[derive(Debug, Error)]
pub enum CroquiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Guidebook PDF errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// No selected page falls inside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the current\n\
directory, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catalog errors ────────────────────────────────────────────────────
    /// A per-page fragment could not be parsed; the whole build is aborted.
    #[error("Malformed route fragment '{path}': {source}")]
    MalformedFragment {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The consolidated catalog could not be read or parsed.
    #[error("Failed to read catalog '{path}': {detail}")]
    CatalogReadFailed { path: PathBuf, detail: String },

    // ── Browsing errors ───────────────────────────────────────────────────
    /// A route index outside the current filtered list was selected.
    #[error("Route index {index} is out of range ({len} routes in the current selection)")]
    SelectionOutOfRange { index: usize, len: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single guidebook page.
///
/// The extraction run logs it, records it in the page outcome and moves on.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page image is missing or unreadable.
    #[error("Page {page}: image unavailable: {detail}")]
    ImageUnavailable { page: usize, detail: String },

    /// Text recognition failed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// The model reply did not contain a route page.
    #[error("Page {page}: no recognizable routes: {detail}")]
    NoRoutes { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::ImageUnavailable { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::LlmFailed { page, .. }
            | PageError::NoRoutes { page, .. } => *page,
        }
    }
}
