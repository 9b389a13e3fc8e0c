//! Post-processing: turn a raw model reply into a [`CroquiPage`].
//!
//! Even well-prompted models wrap JSON in ```` ```json ```` fences, add a
//! sentence before or after the object, or sprinkle invisible Unicode into
//! the text. These deterministic rules undo that before parsing:
//!
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Strip outer code fences
//! 4. Cut the text down to the outermost `{ … }` object
//!
//! A reply that still does not parse, or parses to a page without routes,
//! is a [`PageError::NoRoutes`] and the page is skipped.

use crate::error::PageError;
use crate::route::CroquiPage;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw reply down to the JSON object it carries, if any.
pub fn extract_json(reply: &str) -> Option<String> {
    let s = normalise_line_endings(reply);
    let s = remove_invisible_chars(&s);
    let s = strip_code_fences(&s);
    outermost_object(&s).map(str::to_string)
}

/// Parse a reply for page `page_num` into a route page.
pub fn parse_page(reply: &str, page_num: usize) -> Result<CroquiPage, PageError> {
    let json = extract_json(reply).ok_or_else(|| PageError::NoRoutes {
        page: page_num,
        detail: "reply contains no JSON object".into(),
    })?;

    let page: CroquiPage = serde_json::from_str(&json).map_err(|e| PageError::NoRoutes {
        page: page_num,
        detail: format!("reply is not a route page: {e}"),
    })?;

    if page.routes.is_empty() {
        return Err(PageError::NoRoutes {
            page: page_num,
            detail: "page lists no routes".into(),
        });
    }
    Ok(page)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 4: Outermost object ─────────────────────────────────────────────────

fn outermost_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{"page_message": "Respect the landowner.", "routes": [
        {"id_number": 1, "name": "Aresta", "grade": "V3", "description": "Sit start.",
         "page_number": 17, "block": "Bloco do Sapo", "sector": "Setor Seu Luiz"}
    ]}"#;

    #[test]
    fn plain_json_parses() {
        let page = parse_page(PAGE, 17).unwrap();
        assert_eq!(page.routes.len(), 1);
        assert_eq!(page.routes[0].grade(), Some("V3"));
        assert_eq!(page.page_message, "Respect the landowner.");
    }

    #[test]
    fn fenced_json_with_chatter_parses() {
        let reply = format!("```json\r\n{PAGE}\r\n```");
        assert_eq!(parse_page(&reply, 17).unwrap().routes.len(), 1);

        let reply = format!("Here is the page:\n{PAGE}\nLet me know!");
        assert_eq!(parse_page(&reply, 17).unwrap().routes.len(), 1);
    }

    #[test]
    fn invisible_chars_are_removed() {
        let reply = format!("\u{FEFF}{}", PAGE.replace("Aresta", "Ares\u{200B}ta"));
        let page = parse_page(&reply, 17).unwrap();
        assert_eq!(page.routes[0].name, "Aresta");
    }

    #[test]
    fn prose_only_reply_is_no_routes() {
        let err = parse_page("This page is the table of contents.", 2).unwrap_err();
        assert!(matches!(err, PageError::NoRoutes { page: 2, .. }));
    }

    #[test]
    fn empty_route_list_is_no_routes() {
        let err = parse_page(r#"{"page_message": "Intro", "routes": []}"#, 1).unwrap_err();
        assert!(matches!(err, PageError::NoRoutes { page: 1, .. }));
    }

    #[test]
    fn broken_json_is_no_routes() {
        assert!(parse_page(r#"{"routes": [{"name": "A""#, 3).is_err());
    }
}
