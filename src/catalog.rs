//! Catalog Builder and Catalog Store.
//!
//! The builder walks a directory tree of per-page fragments
//! (`page_{N}.json`, each a [`CroquiPage`]) and files every route into up
//! to three buckets: by grade, by block and by sector. A route missing one
//! of those attributes is left out of that index only.
//!
//! The store is the consolidated JSON file written by the builder. It is
//! overwritten whole on every build and read once by the browsing front-end.
//!
//! ```text
//! output/guide/page_1.json ┐
//! output/guide/page_2.json ├─▶ build_catalog ─▶ output/consolidated_routes.json
//! output/guide/page_9.json ┘
//! ```
//!
//! A malformed fragment aborts the whole build with
//! [`CroquiError::MalformedFragment`]; there is no partial catalog.

use crate::error::CroquiError;
use crate::route::{CroquiPage, Route};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where the browsing front-end expects the consolidated catalog.
pub const DEFAULT_CATALOG_PATH: &str = "output/consolidated_routes.json";

/// Ordered route buckets keyed by the raw attribute value.
pub type RouteIndex = IndexMap<String, Vec<Route>>;

/// The consolidated, triple-indexed collection of all routes.
///
/// Keys keep first-seen order, which is the order filtering iterates in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub by_grade: RouteIndex,
    #[serde(default)]
    pub by_block: RouteIndex,
    #[serde(default)]
    pub by_sector: RouteIndex,
}

impl Catalog {
    /// File one route into every index it has a non-empty key for.
    pub fn insert(&mut self, route: Route) {
        if let Some(block) = route.block() {
            self.by_block
                .entry(block.to_string())
                .or_default()
                .push(route.clone());
        }
        if let Some(sector) = route.sector() {
            self.by_sector
                .entry(sector.to_string())
                .or_default()
                .push(route.clone());
        }
        if let Some(grade) = route.grade() {
            let key = grade.to_string();
            self.by_grade.entry(key).or_default().push(route);
        }
    }

    /// Every route, grade bucket by grade bucket.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.by_grade.values().flatten()
    }

    /// Sum of the grade bucket sizes.
    pub fn route_count(&self) -> usize {
        self.by_grade.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_grade.is_empty() && self.by_block.is_empty() && self.by_sector.is_empty()
    }

    /// Load a consolidated catalog from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CroquiError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CroquiError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => CroquiError::CatalogReadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

        let catalog: Catalog =
            serde_json::from_str(&text).map_err(|e| CroquiError::CatalogReadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        debug!(
            "Loaded catalog {}: {} grades, {} blocks, {} sectors",
            path.display(),
            catalog.by_grade.len(),
            catalog.by_block.len(),
            catalog.by_sector.len()
        );
        Ok(catalog)
    }

    /// Write the catalog, replacing any previous version.
    ///
    /// The file is written next to its destination and renamed into place so
    /// a reader never sees a half-written catalog.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CroquiError> {
        let path = path.as_ref();
        info!("Saving JSON {}", path.display());
        let bytes = to_pretty_json(self).map_err(|e| CroquiError::Internal(e.to_string()))?;
        write_atomic(path, &bytes)
    }
}

/// Scan `root` recursively and merge every `*.json` fragment into a catalog.
///
/// `skip` names a file to ignore, normally the catalog being rebuilt when it
/// lives inside `root`.
pub fn build_catalog(root: impl AsRef<Path>, skip: Option<&Path>) -> Result<Catalog, CroquiError> {
    let root = root.as_ref();
    let skip = skip.and_then(|p| p.canonicalize().ok());
    let mut catalog = Catalog::default();
    let mut fragments = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_json(entry.path()) {
            continue;
        }
        if skip.is_some() && entry.path().canonicalize().ok() == skip {
            debug!("Skipping catalog output {}", entry.path().display());
            continue;
        }

        let page = read_fragment(entry.path())?;
        fragments += 1;
        for route in page.routes {
            catalog.insert(route);
        }
    }

    info!(
        "Collected {} routes from {} fragments under {}",
        catalog.route_count(),
        fragments,
        root.display()
    );
    Ok(catalog)
}

/// Build the catalog from `root` and persist it to `output`.
pub fn collect_into(
    root: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<Catalog, CroquiError> {
    let output = output.as_ref();
    let catalog = build_catalog(root, Some(output))?;
    catalog.save(output)?;
    Ok(catalog)
}

/// Parse one per-page fragment.
pub fn read_fragment(path: &Path) -> Result<CroquiPage, CroquiError> {
    info!("Reading JSON file {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| CroquiError::CatalogReadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|source| CroquiError::MalformedFragment {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON with four-space indentation, the layout fragments use too.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Write `bytes` to a temp file beside `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CroquiError> {
    let write_err = |source: std::io::Error| CroquiError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn routes_land_in_each_index_once() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "guide/page_5.json",
            json!({"page_message": "", "routes": [
                {"id_number": 1, "name": "A", "grade": "V2", "block": "Bloco X", "sector": "Setor Y", "page_number": 5},
                {"id_number": 2, "name": "B", "grade": "V2", "block": "Bloco Z", "sector": "Setor Y", "page_number": 5}
            ]}),
        );

        let catalog = build_catalog(dir.path(), None).unwrap();
        assert_eq!(catalog.by_grade["V2"].len(), 2);
        assert_eq!(catalog.by_block["Bloco X"].len(), 1);
        assert_eq!(catalog.by_block["Bloco Z"].len(), 1);
        assert_eq!(catalog.by_sector["Setor Y"].len(), 2);
        assert_eq!(catalog.route_count(), 2);
    }

    #[test]
    fn missing_attributes_only_drop_that_index() {
        let mut catalog = Catalog::default();
        catalog.insert(Route {
            name: "no block".into(),
            grade: Some("V1".into()),
            block: Some(String::new()),
            sector: Some("Setor A".into()),
            ..Default::default()
        });
        catalog.insert(Route {
            name: "nothing".into(),
            ..Default::default()
        });

        assert_eq!(catalog.by_grade["V1"].len(), 1);
        assert!(catalog.by_block.is_empty());
        assert_eq!(catalog.by_sector["Setor A"].len(), 1);
        assert_eq!(catalog.route_count(), 1);
    }

    #[test]
    fn ignores_non_json_files_and_pages_without_routes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page_1.txt"), "Bloco X\n1. Aresta V3").unwrap();
        write(dir.path(), "page_1.json", json!({"page_message": "Intro"}));

        let catalog = build_catalog(dir.path(), None).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn malformed_fragment_aborts_the_build() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a/page_1.json",
            json!({"routes": [{"name": "fine", "grade": "V0"}]}),
        );
        std::fs::write(dir.path().join("page_2.json"), "{\"routes\": [").unwrap();

        let err = build_catalog(dir.path(), None).unwrap_err();
        assert!(matches!(err, CroquiError::MalformedFragment { .. }), "got {err:?}");
    }

    #[test]
    fn saved_catalog_echoes_fragment_routes() {
        let dir = tempfile::tempdir().unwrap();
        let original = json!({
            "id": 7, "name": "A", "grade": "V1", "block": null,
            "sector": "S", "page_number": 1, "stars": 2
        });
        let odd_id = json!({"id_number": "12a", "name": "B", "grade": "V1", "page_number": 1});
        write(
            dir.path(),
            "guide/page_1.json",
            json!({"page_message": "", "routes": [original.clone(), odd_id.clone()]}),
        );

        let out = dir.path().join("consolidated_routes.json");
        collect_into(dir.path(), &out).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(saved["by_grade"]["V1"], json!([original.clone(), odd_id]));
        assert_eq!(saved["by_sector"]["S"], json!([original]));
        assert!(saved["by_block"].as_object().unwrap().is_empty());
    }

    #[test]
    fn rebuild_skips_its_own_output() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "guide/page_3.json",
            json!({"routes": [{"name": "A", "grade": "V4", "page_number": 3}]}),
        );
        let out = dir.path().join("consolidated_routes.json");

        let first = collect_into(dir.path(), &out).unwrap();
        let second = collect_into(dir.path(), &out).unwrap();
        assert_eq!(first, second);
        assert_eq!(Catalog::load(&out).unwrap().route_count(), 1);
    }

    #[test]
    fn save_overwrites_and_load_keeps_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/catalog.json");

        let mut catalog = Catalog::default();
        for grade in ["V7", "V0", "V3"] {
            catalog.insert(Route {
                grade: Some(grade.into()),
                ..Default::default()
            });
        }
        Catalog::default().save(&path).unwrap();
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        let keys: Vec<&str> = loaded.by_grade.keys().map(String::as_str).collect();
        assert_eq!(keys, ["V7", "V0", "V3"]);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"by_grade\""), "expected 4-space indent:\n{text}");
    }

    #[test]
    fn load_missing_catalog_is_file_not_found() {
        let err = Catalog::load("/definitely/not/here/consolidated_routes.json").unwrap_err();
        assert!(matches!(err, CroquiError::FileNotFound { .. }));
    }
}
