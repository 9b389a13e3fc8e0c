//! Fragments on disk → catalog → filters → browsing → PDF export.
//!
//! Everything runs against temp directories; page images are small PNGs
//! generated on the fly.

use croqui::{
    collect_into, export_routes, filter_routes, BrowseSession, Catalog, CroquiError, Facets,
};
use image::{Rgb, RgbImage};
use serde_json::json;
use std::path::Path;

fn write_fragment(dir: &Path, page: u32, routes: serde_json::Value) {
    std::fs::create_dir_all(dir).unwrap();
    let body = json!({ "page_message": "", "routes": routes });
    std::fs::write(
        dir.join(format!("page_{page}.json")),
        serde_json::to_string_pretty(&body).unwrap(),
    )
    .unwrap();
}

fn write_png(dir: &Path, page: u32, w: u32, h: u32) {
    RgbImage::from_pixel(w, h, Rgb([200, 180, 150]))
        .save(dir.join(format!("page_{page}.png")))
        .unwrap();
}

/// Two routes on two pages, sharing a sector.
fn guidebook(root: &Path) -> std::path::PathBuf {
    let book = root.join("guidebook");
    write_fragment(
        &book,
        1,
        json!([{ "id_number": 1, "name": "A", "grade": "V3", "description": "",
                 "page_number": 1, "block": "Bloco X", "sector": "Setor Y" }]),
    );
    write_fragment(
        &book,
        2,
        json!([{ "id_number": 2, "name": "B", "grade": "V5", "description": "Traverse",
                 "page_number": 2, "block": "Bloco Z", "sector": "Setor Y" }]),
    );
    book
}

#[test]
fn collect_filter_browse_export() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("output");
    let book = guidebook(&root);
    let catalog_path = root.join("consolidated_routes.json");

    let built = collect_into(&root, &catalog_path).unwrap();
    assert_eq!(built.route_count(), 2);

    // A second collect must not read its own output back in.
    let rebuilt = collect_into(&root, &catalog_path).unwrap();
    assert_eq!(rebuilt.route_count(), 2);

    let catalog = Catalog::load(&catalog_path).unwrap();
    assert_eq!(
        catalog.by_grade.keys().collect::<Vec<_>>(),
        vec!["V3", "V5"]
    );

    let in_sector = filter_routes(&catalog, None, None, Some("setor y"));
    let names: Vec<&str> = in_sector.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    let on_block = filter_routes(&catalog, None, Some("bloco x"), None);
    assert_eq!(on_block.len(), 1);
    assert_eq!(on_block[0].id, 1);

    assert!(filter_routes(&catalog, Some("V9"), None, None).is_empty());

    assert_eq!(Facets::sectors(&catalog), vec!["setor y"]);
    assert_eq!(
        Facets::blocks(&catalog, Some("Setor Y")),
        vec!["bloco x", "bloco z"]
    );
    assert_eq!(Facets::grades(&catalog, Some("bloco z")), vec!["V5"]);

    let mut session = BrowseSession::new(in_sector.clone());
    assert_eq!(session.current().map(|r| r.name.as_str()), Some("A"));
    session.next();
    assert_eq!(session.current().map(|r| r.name.as_str()), Some("B"));
    assert!(!session.has_next());
    assert!(matches!(
        session.select(2),
        Err(CroquiError::SelectionOutOfRange { index: 2, len: 2 })
    ));
    session.set_routes(on_block);
    assert_eq!(session.cursor(), 0);

    write_png(&book, 1, 1200, 800);
    write_png(&book, 2, 600, 900);
    let exports = tmp.path().join("exports");
    let pdf = export_routes(&in_sector, &book, &exports, Some("Setor Y"), None, None).unwrap();

    assert_eq!(pdf, exports.join("routes_Setor_Y_All_All.pdf"));
    let doc = lopdf::Document::load(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn export_skips_routes_without_page_images() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("output");
    let book = guidebook(&root);
    let catalog = collect_into(&root, root.join("consolidated_routes.json")).unwrap();

    write_png(&book, 1, 400, 300);
    let routes = filter_routes(&catalog, None, None, None);
    assert_eq!(routes.len(), 2);

    let pdf = export_routes(
        &routes,
        &book,
        tmp.path(),
        Some("Setor A"),
        None,
        Some("V3"),
    )
    .unwrap();

    assert_eq!(
        pdf.file_name().unwrap().to_str().unwrap(),
        "routes_Setor_A_All_V3.pdf"
    );
    let doc = lopdf::Document::load(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn malformed_fragment_aborts_collect() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("output");
    guidebook(&root);
    std::fs::write(root.join("guidebook").join("page_3.json"), "{ not json").unwrap();

    let err = collect_into(&root, root.join("consolidated_routes.json")).unwrap_err();
    assert!(matches!(err, CroquiError::MalformedFragment { .. }));
    assert!(!root.join("consolidated_routes.json").exists());
}
