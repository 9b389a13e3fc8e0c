//! # croqui
//!
//! A browsable catalog of bouldering routes extracted from a scanned
//! guidebook PDF.
//!
//! ## Why this crate?
//!
//! Guidebooks list hundreds of problems spread over topo pages, grouped by
//! sector and block. This crate turns the scanned book into a JSON catalog
//! once, offline, and then lets climbers narrow it down by sector, block and
//! grade, step through the matches, and take the matching topo pages along
//! as a single PDF.
//!
//! ## Overview
//!
//! ```text
//! guidebook.pdf
//!  │
//!  ├─ 1. Extract   render pages, OCR, model → page_{N}.json   (extract)
//!  ├─ 2. Collect   merge fragments → consolidated_routes.json (catalog)
//!  ├─ 3. Filter    sector / block / grade                     (filter)
//!  ├─ 4. Browse    cursor over the matches                    (session)
//!  └─ 5. Export    one PDF page per matching topo image       (export)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use croqui::{filter_routes, export_routes, Catalog, DEFAULT_CATALOG_PATH};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::load(DEFAULT_CATALOG_PATH)?;
//!     let routes = filter_routes(&catalog, None, Some("bloco do sapo"), None);
//!     for route in &routes {
//!         println!("{}", route.label());
//!     }
//!     let pdf = export_routes(
//!         &routes,
//!         Path::new("output/guidebook"),
//!         Path::new("exports"),
//!         None,
//!         Some("bloco do sapo"),
//!         None,
//!     )?;
//!     eprintln!("wrote {}", pdf.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `croqui` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod route;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{build_catalog, collect_into, Catalog, RouteIndex, DEFAULT_CATALOG_PATH};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection, DEFAULT_MODEL};
pub use error::{CroquiError, PageError};
pub use export::{export_filename, export_routes, fit_to_canvas, Canvas, Placement};
pub use extract::{extract_guidebook, extract_pages};
pub use filter::{filter_routes, normalize_name, Facets};
pub use output::{ExtractionOutput, ExtractionStats, PageOutcome};
pub use pipeline::llm::{resolve_provider, Extraction, LlmRouteExtractor, RouteExtractor};
pub use pipeline::ocr::{TesseractCli, TextRecognizer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use route::{CroquiPage, Route};
pub use session::BrowseSession;
