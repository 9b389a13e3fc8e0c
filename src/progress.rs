//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the extraction run works through the guidebook.
//!
//! # Example
//!
//! ```rust
//! use croqui::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RouteCounter {
//!     routes: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RouteCounter {
//!     fn on_page_complete(&self, _page: usize, _total: usize, routes_found: usize) {
//!         self.routes.fetch_add(routes_found, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RouteCounter { routes: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction run as it processes each page.
///
/// Model calls for several pages may be in flight at once, so methods can be
/// called from concurrently polled futures. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after page selection, before any page is processed.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's text is sent to the extractor.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page yields routes.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, routes_found: usize) {
        let _ = (page_num, total_pages, routes_found);
    }

    /// Called when a page is skipped.
    fn on_page_skipped(&self, page_num: usize, total_pages: usize, reason: &str) {
        let _ = (page_num, total_pages, reason);
    }

    /// Called once after every selected page has been attempted.
    fn on_run_complete(&self, total_pages: usize, extracted: usize) {
        let _ = (total_pages, extracted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tally {
        completed: AtomicUsize,
        skipped: AtomicUsize,
        routes: AtomicUsize,
    }

    impl ExtractionProgressCallback for Tally {
        fn on_page_complete(&self, _page_num: usize, _total: usize, routes_found: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.routes.fetch_add(routes_found, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, _page_num: usize, _total: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 6);
        cb.on_page_skipped(2, 3, "no routes");
        cb.on_run_complete(3, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let tally = Tally::default();
        tally.on_page_complete(1, 2, 4);
        tally.on_page_skipped(2, 2, "intro page");
        tally.on_run_complete(2, 1);
        assert_eq!(tally.completed.load(Ordering::SeqCst), 1);
        assert_eq!(tally.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tally.routes.load(Ordering::SeqCst), 4);
    }
}
