//! PDF rasterisation: write selected guidebook pages as `page_{N}.png`.
//!
//! pdfium is not async-safe, so all work runs inside
//! `tokio::task::spawn_blocking`. Images already on disk are reused; only
//! missing pages are rendered.
//!
//! Pages are rendered at `dpi`, capped so neither side exceeds
//! `max_rendered_pixels`. A page pdfium cannot render is reported as a
//! [`PageError::RenderFailed`] and the remaining pages still render.

use crate::config::ExtractionConfig;
use crate::error::{CroquiError, PageError};
use crate::route::page_image_path;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind pdfium: `PDFIUM_LIB_PATH` (file or directory) first, then the
/// current directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, CroquiError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            Pdfium::bind_to_library(lib)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| CroquiError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Number of pages in the guidebook.
pub async fn page_count(pdf_path: &Path, password: Option<&str>) -> Result<usize, CroquiError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = load_document(&pdfium, &path, pwd.as_deref())?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| CroquiError::Internal(format!("Page count task panicked: {e}")))?
}

/// Render every selected page whose image is not yet in `folder`.
///
/// # Returns
/// One entry per page attempted: the 1-indexed page number on success, or
/// the page-level failure.
pub async fn render_missing_pages(
    pdf_path: &Path,
    folder: &Path,
    config: &ExtractionConfig,
    page_indices: &[usize],
) -> Result<Vec<Result<usize, PageError>>, CroquiError> {
    let missing: Vec<usize> = page_indices
        .iter()
        .copied()
        .filter(|&idx| !page_image_path(folder, (idx + 1) as u32).exists())
        .collect();

    if missing.is_empty() {
        debug!("All {} page images already present", page_indices.len());
        return Ok(Vec::new());
    }

    let path = pdf_path.to_path_buf();
    let folder = folder.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, &folder, dpi, max_pixels, password.as_deref(), &missing)
    })
    .await
    .map_err(|e| CroquiError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    folder: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<Result<usize, PageError>>, CroquiError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Rendering {} of {} pages", page_indices.len(), total_pages);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let render_err = |detail: String| PageError::RenderFailed {
            page: idx + 1,
            detail,
        };

        let image = match pages.get(idx as u16) {
            Ok(page) => {
                let width_px = target_width(page.width().value, dpi, max_pixels);
                let render_config = PdfRenderConfig::new()
                    .set_target_width(width_px)
                    .set_maximum_height(max_pixels as i32);
                page.render_with_config(&render_config)
                    .map(|bitmap| bitmap.as_image())
                    .map_err(|e| render_err(format!("{e:?}")))
            }
            Err(e) => Err(render_err(format!("{e:?}"))),
        };

        let image = match image {
            Ok(image) => image,
            Err(e) => {
                warn!("{}", e);
                results.push(Err(e));
                continue;
            }
        };

        let out = page_image_path(folder, (idx + 1) as u32);
        image
            .save_with_format(&out, image::ImageFormat::Png)
            .map_err(|e| CroquiError::RasterisationFailed {
                page: idx + 1,
                detail: format!("saving {}: {e}", out.display()),
            })?;

        debug!(
            "Rendered page {} → {}x{} px → {}",
            idx + 1,
            image.width(),
            image.height(),
            out.display()
        );
        results.push(Ok(idx + 1));
    }

    Ok(results)
}

/// Pixel width of a page `width_pt` points wide at `dpi`, capped at `max_pixels`.
fn target_width(width_pt: f32, dpi: u32, max_pixels: u32) -> i32 {
    let px = (width_pt * dpi as f32 / 72.0).round() as u32;
    px.clamp(1, max_pixels) as i32
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, CroquiError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                CroquiError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                CroquiError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            CroquiError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
