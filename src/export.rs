//! Export Service: render a route selection as a slide-sized PDF.
//!
//! Every output page is a fixed 254 mm × 191 mm landscape canvas holding one
//! guidebook page image (`page_{N}.png`), scaled uniformly to fit and
//! centred. Pages follow the input route order; two routes on the same
//! guidebook page produce two identical PDF pages.
//!
//! ## Skips
//!
//! A missing or undecodable image drops that route's page and the export
//! continues. The caller only gets the output path back, which may point
//! at a PDF with zero pages. Skips are visible in the `warn` log.
//!
//! ## Geometry
//!
//! Images are assumed to be 96 DPI. The fitting box is the canvas measured
//! in whole pixels at that density (960 × 721 px), and the placed size is
//! converted back to millimetres before centring.

use crate::catalog::write_atomic;
use crate::error::CroquiError;
use crate::route::Route;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Re-encoding quality for embedded page images.
pub const JPEG_QUALITY: u8 = 95;

const MM_PER_INCH: f64 = 25.4;
const PT_PER_MM: f64 = 72.0 / MM_PER_INCH;

/// Page size and the pixel density assumed for source images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width_mm: f64,
    pub height_mm: f64,
    pub dpi: f64,
}

/// Presentation-slide page used for every export.
pub const SLIDE: Canvas = Canvas {
    width_mm: 254.0,
    height_mm: 191.0,
    dpi: 96.0,
};

impl Canvas {
    /// Canvas size in whole pixels at `dpi`.
    pub fn size_px(&self) -> (f64, f64) {
        (
            (self.width_mm / MM_PER_INCH * self.dpi).floor(),
            (self.height_mm / MM_PER_INCH * self.dpi).floor(),
        )
    }

    fn px_to_mm(&self, px: f64) -> f64 {
        px / self.dpi * MM_PER_INCH
    }
}

/// Where an image lands on the canvas, in millimetres from the top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Largest uniform scale of a `width_px` × `height_px` image that fits the
/// canvas, centred.
pub fn fit_to_canvas(canvas: &Canvas, width_px: u32, height_px: u32) -> Placement {
    let (box_w, box_h) = canvas.size_px();
    let (w, h) = (f64::from(width_px.max(1)), f64::from(height_px.max(1)));
    let scale = (box_w / w).min(box_h / h);

    let width_mm = canvas.px_to_mm(w * scale);
    let height_mm = canvas.px_to_mm(h * scale);
    Placement {
        x_mm: (canvas.width_mm - width_mm) / 2.0,
        y_mm: (canvas.height_mm - height_mm) / 2.0,
        width_mm,
        height_mm,
    }
}

/// `routes_{sector}_{block}_{grade}.pdf`, with `All` for unset filters.
pub fn export_filename(sector: Option<&str>, block: Option<&str>, grade: Option<&str>) -> String {
    format!(
        "routes_{}_{}_{}.pdf",
        filename_part(sector),
        filename_part(block),
        filename_part(grade)
    )
}

/// Replace spaces and path separators with underscores.
pub fn sanitize_filename(text: &str) -> String {
    text.replace([' ', '/', '\\'], "_")
}

fn filename_part(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => sanitize_filename(v),
        _ => "All".to_string(),
    }
}

/// Export one PDF page per route whose page image exists in `image_folder`.
///
/// Returns the path of the written PDF inside `output_dir` (created if
/// needed). Only a failure to write that file is an error.
pub fn export_routes(
    routes: &[Route],
    image_folder: &Path,
    output_dir: &Path,
    sector: Option<&str>,
    block: Option<&str>,
    grade: Option<&str>,
) -> Result<PathBuf, CroquiError> {
    let output_path = output_dir.join(export_filename(sector, block, grade));
    info!(
        "Exporting {} routes to {}",
        routes.len(),
        output_path.display()
    );

    let mut deck = SlideDeck::new(SLIDE);
    let mut skipped = 0usize;

    for route in routes {
        let image_path = route.image_path(image_folder);
        if !image_path.is_file() {
            warn!(
                "Image {} not found for route '{}', skipping",
                image_path.display(),
                route.name
            );
            skipped += 1;
            continue;
        }

        // The decoded image is dropped before the next route is read.
        let placed = image::open(&image_path).and_then(|img| deck.add_image_page(&img));
        if let Err(e) = placed {
            warn!("Error processing image {}: {}", image_path.display(), e);
            skipped += 1;
        }
    }

    let pages = deck.page_count();
    let bytes = deck.finish().map_err(|source| CroquiError::OutputWriteFailed {
        path: output_path.clone(),
        source,
    })?;
    write_atomic(&output_path, &bytes)?;

    info!(
        "Wrote {} pages to {} ({} routes skipped)",
        pages,
        output_path.display(),
        skipped
    );
    Ok(output_path)
}

/// In-memory PDF with one full-canvas image per page.
struct SlideDeck {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    canvas: Canvas,
}

impl SlideDeck {
    fn new(canvas: Canvas) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            canvas,
        }
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Embed `img` as JPEG and add a page showing it.
    fn add_image_page(&mut self, img: &DynamicImage) -> image::ImageResult<()> {
        let rgb = img.to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;

        let placement = fit_to_canvas(&self.canvas, rgb.width(), rgb.height());
        debug!(
            "Placing {}x{} px image at ({:.1}, {:.1}) mm, {:.1} x {:.1} mm",
            rgb.width(),
            rgb.height(),
            placement.x_mm,
            placement.y_mm,
            placement.width_mm,
            placement.height_mm
        );

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(rgb.width()),
                "Height" => i64::from(rgb.height()),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        // PDF space is in points with the origin at the bottom-left.
        let w = placement.width_mm * PT_PER_MM;
        let h = placement.height_mm * PT_PER_MM;
        let x = placement.x_mm * PT_PER_MM;
        let y = (self.canvas.height_mm - placement.y_mm - placement.height_mm) * PT_PER_MM;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![real(w), 0.into(), 0.into(), real(h), real(x), real(y)],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| {
            image::ImageError::IoError(std::io::Error::other(format!("content stream: {e}")))
        })?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Close the page tree and serialise the document.
    fn finish(mut self) -> std::io::Result<Vec<u8>> {
        let (w, h) = (
            self.canvas.width_mm * PT_PER_MM,
            self.canvas.height_mm * PT_PER_MM,
        );
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), real(w), real(h)],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(buf)
    }
}

fn real(value: f64) -> Object {
    (value as f32).into()
}
