//! Image encoding: page PNG on disk → base64 `ImageData` for the model.
//!
//! Used only when `attach_page_image` is set, to let a vision-capable model
//! check the OCR text against the page itself. The PNG is sent as-is;
//! lossless images keep small grade tokens legible.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// Read a rendered page image and wrap it for a multimodal request.
pub fn encode_page_file(path: &Path) -> std::io::Result<ImageData> {
    let bytes = std::fs::read(path)?;
    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} → {} bytes base64", path.display(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
