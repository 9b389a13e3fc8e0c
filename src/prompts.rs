//! Prompts for structuring OCR text into route records.
//!
//! The system prompt carries the task and the output schema; the user
//! message carries one page's text and number. Callers can override the
//! system prompt via [`crate::config::ExtractionConfig::system_prompt`].

/// Default instructions for turning one guidebook page into JSON.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You receive the text version of one page of a bouldering guidebook, recognised by OCR. Your task is to organise the text and output it as JSON.

The page usually contains the block name (in Portuguese "Bloco"), the sector (e.g. "Setor Seu Luiz"), some warnings or instructions, followed by a list of climbing routes, each with an id number, a name and a grade. Each route must become a separate item in the output, including the page number.

Output format: a single JSON object with exactly these keys

{
  "page_message": "any page-level text: warnings, access info, etc. (string, may be empty)",
  "routes": [
    {
      "id_number": 1,
      "name": "name of the route",
      "grade": "route grade, e.g. V0, V10",
      "description": "how to start and climb the route",
      "page_number": 1,
      "block": "name of the boulder/block",
      "sector": "name of the sector where the block is located"
    }
  ]
}

Rules:
- Output ONLY the JSON object, no commentary
- Do NOT wrap the JSON in code fences
- Use the page number given below for every route on the page
- If the page lists no routes, return an empty "routes" array"#;

/// Build the user message for one page.
pub fn page_message(page_content: &str, page_number: usize) -> String {
    format!("Page content:\n{page_content}\n\npage number: {page_number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_message_carries_text_and_number() {
        let msg = page_message("BLOCO DO SAPO\n1. Aresta V3", 17);
        assert!(msg.contains("BLOCO DO SAPO"));
        assert!(msg.ends_with("page number: 17"));
    }

    #[test]
    fn default_prompt_names_every_route_field() {
        for field in ["id_number", "name", "grade", "description", "page_number", "block", "sector"] {
            assert!(DEFAULT_EXTRACTION_PROMPT.contains(field), "missing {field}");
        }
    }
}
