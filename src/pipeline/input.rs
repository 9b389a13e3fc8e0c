//! Input validation and output-folder naming for the extraction run.
//!
//! We check the PDF magic bytes (`%PDF`) before handing the file to pdfium so
//! callers get a meaningful error rather than a pdfium failure.

use crate::error::CroquiError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_FOLDER_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\-]").unwrap());

/// Validate a local guidebook PDF: it must exist, be readable and start
/// with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<PathBuf, CroquiError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(CroquiError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(CroquiError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CroquiError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(CroquiError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_folder_name(name: &str) -> String {
    RE_FOLDER_UNSAFE.replace_all(name, "_").into_owned()
}

/// `output_root/<sanitized PDF stem>`, the per-guidebook working folder.
pub fn output_folder(pdf_path: &Path, output_root: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_root.join(sanitize_folder_name(&stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_is_sanitized() {
        assert_eq!(sanitize_folder_name("Croqui_Iperocks_v4-3"), "Croqui_Iperocks_v4-3");
        assert_eq!(sanitize_folder_name("Croqui Iperocks v4.3"), "Croqui_Iperocks_v4_3");
        assert_eq!(sanitize_folder_name("Guia São Bento"), "Guia_S_o_Bento");
    }

    #[test]
    fn output_folder_uses_pdf_stem() {
        assert_eq!(
            output_folder(Path::new("assets/Croqui Iperocks.pdf"), Path::new("output")),
            PathBuf::from("output/Croqui_Iperocks")
        );
    }

    #[test]
    fn rejects_missing_and_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        assert!(matches!(
            validate_pdf(&missing),
            Err(CroquiError::FileNotFound { .. })
        ));

        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"PK\x03\x04zip").unwrap();
        assert!(matches!(validate_pdf(&fake), Err(CroquiError::NotAPdf { .. })));

        let real = dir.path().join("real.pdf");
        std::fs::write(&real, b"%PDF-1.5\n").unwrap();
        assert_eq!(validate_pdf(&real).unwrap(), real);
    }
}
