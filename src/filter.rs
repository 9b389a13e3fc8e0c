//! Filter Engine: narrow the catalog to the routes matching a selection.
//!
//! Block and sector are compared after [`normalize_name`], so
//! `"Setor Seu Luís"` matches `"setor seu luis"`. Grade is compared as the
//! raw string.
//!
//! Result order is the order of the narrowing itself: grade buckets in
//! catalog order, then the block and sector predicates applied in turn.
//! Nothing is re-sorted.

use crate::catalog::Catalog;
use crate::route::Route;
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics and surrounding whitespace.
///
/// Diacritics are removed by NFD decomposition, so only letters that
/// decompose into a base letter plus combining marks lose them (`ã`, `é`,
/// `ç`, `ó`). Letters with no decomposition are kept as they are: `ø`,
/// `ß` and `ł` are not transliterated to ASCII.
///
/// Idempotent: `normalize_name(&normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    stripped.trim().to_string()
}

/// Routes matching every given filter. `None` and `""` mean "any".
pub fn filter_routes(
    catalog: &Catalog,
    grade: Option<&str>,
    block: Option<&str>,
    sector: Option<&str>,
) -> Vec<Route> {
    let mut routes: Vec<Route> = match given(grade) {
        Some(grade) => catalog.by_grade.get(grade).cloned().unwrap_or_default(),
        None => catalog.routes().cloned().collect(),
    };

    if let Some(block) = given(block) {
        let wanted = normalize_name(block);
        routes.retain(|r| normalize_name(r.block().unwrap_or("")) == wanted);
    }
    if let Some(sector) = given(sector) {
        let wanted = normalize_name(sector);
        routes.retain(|r| normalize_name(r.sector().unwrap_or("")) == wanted);
    }

    routes
}

/// Cascading choices for a sector → block → grade picker.
///
/// Sector and block choices are normalized names; grades are raw.
pub struct Facets;

impl Facets {
    /// Every sector in the catalog.
    pub fn sectors(catalog: &Catalog) -> Vec<String> {
        sorted_unique(catalog.routes().filter_map(|r| r.sector().map(normalize_name)))
    }

    /// Blocks, limited to `sector` when one is chosen.
    pub fn blocks(catalog: &Catalog, sector: Option<&str>) -> Vec<String> {
        let sector = given(sector).map(normalize_name);
        sorted_unique(
            catalog
                .routes()
                .filter(|r| match &sector {
                    Some(s) => normalize_name(r.sector().unwrap_or("")) == *s,
                    None => true,
                })
                .filter_map(|r| r.block().map(normalize_name)),
        )
    }

    /// Grades, limited to `block` when one is chosen.
    pub fn grades(catalog: &Catalog, block: Option<&str>) -> Vec<String> {
        match given(block).map(normalize_name) {
            Some(block) => sorted_unique(
                catalog
                    .routes()
                    .filter(|r| normalize_name(r.block().unwrap_or("")) == block)
                    .filter_map(|r| r.grade().map(str::to_string)),
            ),
            None => sorted_unique(catalog.by_grade.keys().cloned()),
        }
    }
}

fn given(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn sorted_unique(values: impl Iterator<Item = String>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: u32, grade: &str, block: &str, sector: &str, page: u32) -> Route {
        Route {
            id,
            name: format!("route {id}"),
            grade: Some(grade.into()),
            block: Some(block.into()),
            sector: Some(sector.into()),
            page_number: page,
            ..Default::default()
        }
    }

    fn sample() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.insert(route(1, "V2", "Bloco X", "Setor Y", 5));
        catalog.insert(route(2, "V2", "Bloco Z", "Setor Y", 6));
        catalog.insert(route(3, "V5", "Bloco do Sapo", "Setor Seu Luís", 9));
        catalog.insert(route(4, "V0", "Bloco X", "Setor Y", 5));
        catalog
    }

    fn ids(routes: &[Route]) -> Vec<u32> {
        routes.iter().map(|r| r.id).collect()
    }

    #[test]
    fn normalize_is_case_and_accent_insensitive() {
        assert_eq!(normalize_name("Setor Luís"), normalize_name("setor luis"));
        assert_eq!(normalize_name("  Setor Seu Luís "), "setor seu luis");
        assert_eq!(normalize_name("ÁGUA"), "agua");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["Setor Luís", "  Çà  ", "İstanbul", "\u{301} x", "", "V10", "ǅemal"] {
            let once = normalize_name(s);
            assert_eq!(normalize_name(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn no_filters_returns_every_route_in_grade_order() {
        let catalog = sample();
        let all = filter_routes(&catalog, None, None, None);
        assert_eq!(all.len(), catalog.route_count());
        assert_eq!(ids(&all), [1, 2, 3, 4]);
    }

    #[test]
    fn sector_then_block_narrowing() {
        let catalog = sample();
        let by_sector = filter_routes(&catalog, None, None, Some("setor y"));
        assert_eq!(ids(&by_sector), [1, 2, 4]);

        let narrowed = filter_routes(&catalog, None, Some("bloco x"), Some("SETOR Y"));
        assert_eq!(ids(&narrowed), [1, 4]);

        let narrowed = filter_routes(&catalog, Some("V2"), Some("bloco x"), Some("setor y"));
        assert_eq!(ids(&narrowed), [1]);
    }

    #[test]
    fn accented_sector_matches_plain_input() {
        let catalog = sample();
        let hits = filter_routes(&catalog, None, None, Some("setor seu luis"));
        assert_eq!(ids(&hits), [3]);
    }

    #[test]
    fn grade_is_matched_raw() {
        let catalog = sample();
        assert!(filter_routes(&catalog, Some("v2"), None, None).is_empty());
        assert_eq!(filter_routes(&catalog, Some("V2"), None, None).len(), 2);
        assert!(filter_routes(&catalog, Some("V9"), None, None).is_empty());
    }

    #[test]
    fn unknown_sector_is_empty_not_error() {
        let catalog = sample();
        assert!(filter_routes(&catalog, None, None, Some("Setor Nenhum")).is_empty());
    }

    #[test]
    fn empty_strings_mean_any() {
        let catalog = sample();
        assert_eq!(filter_routes(&catalog, Some(""), Some(""), Some("")).len(), 4);
    }

    #[test]
    fn facets_cascade() {
        let catalog = sample();
        assert_eq!(Facets::sectors(&catalog), ["setor seu luis", "setor y"]);
        assert_eq!(Facets::blocks(&catalog, Some("Setor Y")), ["bloco x", "bloco z"]);
        assert_eq!(
            Facets::blocks(&catalog, None),
            ["bloco do sapo", "bloco x", "bloco z"]
        );
        assert_eq!(Facets::grades(&catalog, Some("bloco x")), ["V0", "V2"]);
        assert_eq!(Facets::grades(&catalog, None), ["V0", "V2", "V5"]);
    }

    #[test]
    fn letters_without_decomposition_are_kept() {
        assert_eq!(normalize_name("Ørsted"), "ørsted");
        assert_eq!(normalize_name("Straße"), "straße");
        assert_eq!(normalize_name("Łódź"), "łodz");
        assert_eq!(normalize_name("Pedra Furada"), "pedra furada");
    }
}
