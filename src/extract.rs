//! The offline extraction run: guidebook PDF → per-page route fragments.
//!
//! For each selected page the run leaves three files in the guidebook's
//! output folder: `page_{N}.png` (rendered), `page_{N}.txt` (recognised
//! text) and `page_{N}.json` (the structured [`CroquiPage`]). Every step
//! reuses what an earlier run already produced, so an interrupted run can
//! simply be started again.
//!
//! Pages that fail to render, recognise or extract are skipped; the
//! fragments of other pages are unaffected. The fragments are merged into
//! the catalog afterwards by [`crate::catalog::collect_into`].

use crate::catalog::{to_pretty_json, write_atomic};
use crate::config::ExtractionConfig;
use crate::error::{CroquiError, PageError};
use crate::output::{ExtractionOutput, ExtractionStats, PageOutcome};
use crate::pipeline::llm::RouteExtractor;
use crate::pipeline::ocr::{self, TextRecognizer};
use crate::pipeline::{input, render};
use crate::route::{page_fragment_path, CroquiPage};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract route fragments from a guidebook PDF.
///
/// # Arguments
/// * `pdf_path` — the scanned guidebook
/// * `output_root` — fragments land in `output_root/<sanitised pdf stem>/`
/// * `recognizer` — OCR for page images, e.g. [`crate::TesseractCli`]
/// * `extractor` — text → routes, e.g. [`crate::LlmRouteExtractor`]
///
/// # Errors
/// Only fatal errors: missing or invalid PDF, pdfium binding failure, an
/// unreadable or password-protected PDF, an empty page selection, or an I/O
/// error writing into the output folder. Page-level failures are reported
/// in [`ExtractionOutput::pages`].
pub async fn extract_guidebook<E: RouteExtractor>(
    pdf_path: impl AsRef<Path>,
    output_root: impl AsRef<Path>,
    config: &ExtractionConfig,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: &E,
) -> Result<ExtractionOutput, CroquiError> {
    let total_start = Instant::now();
    let pdf_path = input::validate_pdf(pdf_path.as_ref())?;
    info!("Starting extraction: {}", pdf_path.display());

    // ── Step 1: Output folder ────────────────────────────────────────────
    let folder = input::output_folder(&pdf_path, output_root.as_ref());
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|source| CroquiError::OutputWriteFailed {
            path: folder.clone(),
            source,
        })?;

    // ── Step 2: Page selection ───────────────────────────────────────────
    let total_pages = render::page_count(&pdf_path, config.password.as_deref()).await?;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(CroquiError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for extraction", page_indices.len());

    // ── Step 3: Rasterise missing pages ──────────────────────────────────
    let render_start = Instant::now();
    let render_results =
        render::render_missing_pages(&pdf_path, &folder, config, &page_indices).await?;
    let mut render_failures = BTreeMap::new();
    let mut rendered_images = 0;
    for result in render_results {
        match result {
            Ok(_) => rendered_images += 1,
            Err(e) => {
                render_failures.insert(e.page(), e);
            }
        }
    }
    info!(
        "Rendered {} page images in {}ms",
        rendered_images,
        render_start.elapsed().as_millis()
    );

    // ── Step 4: OCR + route extraction ───────────────────────────────────
    let page_numbers: Vec<usize> = page_indices.iter().map(|idx| idx + 1).collect();
    let mut output = run_pages(
        folder,
        &page_numbers,
        render_failures,
        config,
        recognizer,
        extractor,
    )
    .await?;

    output.stats.total_pages = total_pages;
    output.stats.rendered_images = rendered_images;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} routes from {}/{} pages, {}ms total",
        output.stats.total_routes,
        output.stats.extracted_pages,
        page_numbers.len(),
        output.stats.total_duration_ms
    );

    Ok(output)
}

/// Recognise and extract pages whose images already sit in `folder`.
///
/// This is the second half of [`extract_guidebook`], usable on its own when
/// page images (or cached `page_{N}.txt` text) were produced elsewhere.
/// `page_numbers` are 1-indexed.
pub async fn extract_pages<E: RouteExtractor>(
    folder: impl Into<PathBuf>,
    page_numbers: &[usize],
    config: &ExtractionConfig,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: &E,
) -> Result<ExtractionOutput, CroquiError> {
    let start = Instant::now();
    let mut output = run_pages(
        folder.into(),
        page_numbers,
        BTreeMap::new(),
        config,
        recognizer,
        extractor,
    )
    .await?;
    output.stats.total_pages = page_numbers.len();
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(output)
}

async fn run_pages<E: RouteExtractor>(
    folder: PathBuf,
    page_numbers: &[usize],
    mut render_failures: BTreeMap<usize, PageError>,
    config: &ExtractionConfig,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: &E,
) -> Result<ExtractionOutput, CroquiError> {
    let total = page_numbers.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // OCR runs one page at a time; tesseract already uses every core.
    let mut outcomes = Vec::with_capacity(total);
    let mut texts = Vec::with_capacity(total);
    for &page_num in page_numbers {
        if let Some(err) = render_failures.remove(&page_num) {
            outcomes.push(skip_page(config, total, PageOutcome::skipped(page_num, 0, err)));
            continue;
        }
        match ocr::page_text(&recognizer, &folder, page_num).await? {
            Ok(text) => texts.push((page_num, text)),
            Err(err) => {
                outcomes.push(skip_page(config, total, PageOutcome::skipped(page_num, 0, err)));
            }
        }
    }

    let extracted: Vec<Result<PageOutcome, CroquiError>> =
        stream::iter(texts.into_iter().map(|(page_num, text)| {
            let folder = &folder;
            async move {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_start(page_num, total);
                }
                let page_start = Instant::now();
                let outcome = match extractor.extract(&text, page_num).await {
                    Ok(extraction) => {
                        let fragment_written = write_fragment(folder, page_num, &extraction.page)?;
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_page_complete(page_num, total, extraction.page.routes.len());
                        }
                        debug!(
                            "Page {}: {} routes",
                            page_num,
                            extraction.page.routes.len()
                        );
                        PageOutcome {
                            page_num,
                            text_chars: text.chars().count(),
                            routes: extraction.page.routes.len(),
                            fragment_written,
                            retries: extraction.retries,
                            duration_ms: page_start.elapsed().as_millis() as u64,
                            error: None,
                        }
                    }
                    Err(err) => {
                        let mut outcome =
                            PageOutcome::skipped(page_num, text.chars().count(), err);
                        outcome.duration_ms = page_start.elapsed().as_millis() as u64;
                        skip_page(config, total, outcome)
                    }
                };
                Ok::<_, CroquiError>(outcome)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    for outcome in extracted {
        outcomes.push(outcome?);
    }
    outcomes.sort_by_key(|o| o.page_num);

    let extracted_pages = outcomes.iter().filter(|o| o.error.is_none()).count();
    let stats = ExtractionStats {
        total_pages: total,
        extracted_pages,
        skipped_pages: outcomes.len() - extracted_pages,
        total_routes: outcomes.iter().map(|o| o.routes).sum(),
        ..Default::default()
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, extracted_pages);
    }

    Ok(ExtractionOutput {
        folder,
        pages: outcomes,
        stats,
    })
}

fn skip_page(config: &ExtractionConfig, total: usize, outcome: PageOutcome) -> PageOutcome {
    if let Some(ref err) = outcome.error {
        match err {
            PageError::NoRoutes { detail, .. } => warn!(
                "Page {} doesn't contain expected information, skipping: {}",
                outcome.page_num, detail
            ),
            other => warn!("Skipping page {}: {}", outcome.page_num, other),
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_skipped(outcome.page_num, total, &err.to_string());
        }
    }
    outcome
}

/// Write `page_{N}.json` unless it already exists. Returns whether it wrote.
fn write_fragment(folder: &Path, page_num: usize, page: &CroquiPage) -> Result<bool, CroquiError> {
    let path = page_fragment_path(folder, page_num as u32);
    if path.exists() {
        debug!("Page {}: keeping existing {}", page_num, path.display());
        return Ok(false);
    }
    let bytes = to_pretty_json(page).map_err(|e| CroquiError::Internal(format!("{e}")))?;
    write_atomic(&path, &bytes)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::Extraction;
    use crate::progress::ExtractionProgressCallback;
    use crate::route::{page_image_path, page_text_path};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing_subscriber::EnvFilter;

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Capture this thread's `warn` logs until the guard drops.
        fn capture(&self) -> tracing::subscriber::DefaultGuard {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(move || sink.clone())
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }
    }

    struct NoOcr;

    impl TextRecognizer for NoOcr {
        fn recognize(&self, _image_path: &Path, page_num: usize) -> Result<String, PageError> {
            Err(PageError::OcrFailed {
                page: page_num,
                detail: "no OCR in tests".into(),
            })
        }
    }

    /// Finds one route on every page whose text mentions "BLOCO".
    struct Canned;

    impl RouteExtractor for Canned {
        async fn extract(&self, text: &str, page_num: usize) -> Result<Extraction, PageError> {
            if !text.contains("BLOCO") {
                return Err(PageError::NoRoutes {
                    page: page_num,
                    detail: "no route listing".into(),
                });
            }
            let page: CroquiPage = serde_json::from_value(serde_json::json!({
                "page_message": "",
                "routes": [{
                    "id_number": page_num, "name": format!("Route {page_num}"),
                    "grade": "V2", "description": "", "page_number": page_num,
                    "block": "Bloco", "sector": "Setor"
                }]
            }))
            .unwrap();
            Ok(Extraction { page, retries: 0 })
        }
    }

    #[derive(Default)]
    struct Tally {
        completed: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl ExtractionProgressCallback for Tally {
        fn on_page_complete(&self, _page: usize, _total: usize, _routes: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_skipped(&self, _page: usize, _total: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn skipped_pages_do_not_affect_the_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(page_text_path(dir.path(), 1), "Introduction").unwrap();
        std::fs::write(page_text_path(dir.path(), 2), "BLOCO DO SAPO\nAresta V2").unwrap();
        std::fs::write(page_image_path(dir.path(), 3), b"png").unwrap();

        let tally = Arc::new(Tally::default());
        let config = ExtractionConfig::builder()
            .progress_callback(tally.clone())
            .build()
            .unwrap();

        let output = extract_pages(dir.path(), &[1, 2, 3], &config, Arc::new(NoOcr), &Canned)
            .await
            .unwrap();

        let pages: Vec<usize> = output.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(matches!(output.pages[0].error, Some(PageError::NoRoutes { .. })));
        assert!(output.pages[1].error.is_none());
        assert!(matches!(output.pages[2].error, Some(PageError::OcrFailed { .. })));

        assert_eq!(output.stats.extracted_pages, 1);
        assert_eq!(output.stats.skipped_pages, 2);
        assert_eq!(output.stats.total_routes, 1);
        assert_eq!(tally.completed.load(Ordering::SeqCst), 1);
        assert_eq!(tally.skipped.load(Ordering::SeqCst), 2);

        assert!(!page_fragment_path(dir.path(), 1).exists());
        let fragment = std::fs::read_to_string(page_fragment_path(dir.path(), 2)).unwrap();
        assert!(fragment.contains("\n    \"page_message\""));
        let page: CroquiPage = serde_json::from_str(&fragment).unwrap();
        assert_eq!(page.routes[0].name, "Route 2");
    }

    #[tokio::test]
    async fn existing_fragment_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(page_text_path(dir.path(), 5), "BLOCO").unwrap();
        let fragment = page_fragment_path(dir.path(), 5);
        std::fs::write(&fragment, r#"{"page_message": "hand edited", "routes": []}"#).unwrap();

        let config = ExtractionConfig::default();
        let output = extract_pages(dir.path(), &[5], &config, Arc::new(NoOcr), &Canned)
            .await
            .unwrap();

        assert_eq!(output.pages[0].routes, 1);
        assert!(!output.pages[0].fragment_written);
        assert!(std::fs::read_to_string(&fragment)
            .unwrap()
            .contains("hand edited"));
    }

    #[tokio::test]
    async fn skip_log_names_the_actual_cause() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(page_text_path(dir.path(), 1), "Introduction").unwrap();
        std::fs::write(page_image_path(dir.path(), 2), b"png").unwrap();

        let logs = LogBuffer::default();
        let _guard = logs.capture();
        let config = ExtractionConfig::default();
        extract_pages(dir.path(), &[1, 2], &config, Arc::new(NoOcr), &Canned)
            .await
            .unwrap();

        let logs = logs.contents();
        let no_routes: Vec<&str> = logs
            .lines()
            .filter(|l| l.contains("doesn't contain expected information"))
            .collect();
        assert_eq!(no_routes.len(), 1, "logs: {logs}");
        assert!(no_routes[0].contains("Page 1"));
        assert!(logs.contains("Skipping page 2"), "logs: {logs}");
        assert!(logs.contains("OCR failed"), "logs: {logs}");
    }

    #[tokio::test]
    async fn missing_pdf_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_guidebook(
            dir.path().join("nope.pdf"),
            dir.path(),
            &ExtractionConfig::default(),
            Arc::new(NoOcr),
            &Canned,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CroquiError::FileNotFound { .. }));
    }
}
