use regex::Regex;
use serde_json::Value;

use crate::error::ExtractionError;

// The page assigns its state object to this global in an inline script.
const BLOB_PATTERN: &str = r"(?s)window\.__WEB_CONTEXT__=(.*?});";
// The first key of that object literal is written without quotes.
const BARE_FIRST_KEY_PATTERN: &str = r"^\{\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*:";

pub struct BlobExtractor {
    // Captures the object literal assigned to the page's context variable.
    blob_regex: Regex,
    bare_first_key_regex: Regex,
}

impl BlobExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let blob_regex = Regex::new(BLOB_PATTERN)?;
        let bare_first_key_regex = Regex::new(BARE_FIRST_KEY_PATTERN)?;
        Ok(Self {
            blob_regex,
            bare_first_key_regex,
        })
    }

    /// Locates the embedded data blob in `markup` and decodes it.
    pub fn extract(&self, markup: &str) -> Result<Value, ExtractionError> {
        let Some(caps) = self.blob_regex.captures(markup) else {
            return Err(ExtractionError::MarkerNotFound);
        };
        let Some(literal) = caps.get(1) else {
            return Err(ExtractionError::MarkerNotFound);
        };
        let fixed = self.quote_first_key(literal.as_str());
        let value = serde_json::from_str(&fixed)?;
        Ok(value)
    }

    fn quote_first_key(&self, literal: &str) -> String {
        self.bare_first_key_regex
            .replace(literal, r#"{"$1":"#)
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> BlobExtractor {
        BlobExtractor::new().unwrap()
    }

    #[test]
    fn extracts_blob_with_unquoted_first_key() {
        let page = r#"<html><script>window.__WEB_CONTEXT__={pageManifest:{"reviews":[{"id":1}]}};</script></html>"#;
        let value = extractor().extract(page).unwrap();
        assert_eq!(value, json!({"pageManifest": {"reviews": [{"id": 1}]}}));
    }

    #[test]
    fn leaves_quoted_first_key_alone() {
        let page = r#"window.__WEB_CONTEXT__={"pageManifest":{"a":1}};"#;
        let value = extractor().extract(page).unwrap();
        assert_eq!(value, json!({"pageManifest": {"a": 1}}));
    }

    #[test]
    fn only_first_key_is_requoted() {
        let page = r#"window.__WEB_CONTEXT__={ pageManifest : {"text":"pageManifest: kept"}};"#;
        let value = extractor().extract(page).unwrap();
        assert_eq!(value["pageManifest"]["text"], "pageManifest: kept");
    }

    #[test]
    fn blob_may_span_lines() {
        let page = "window.__WEB_CONTEXT__={pageManifest:\n{\"x\":\n[1,2]}};\nvar other = 1;";
        let value = extractor().extract(page).unwrap();
        assert_eq!(value["pageManifest"]["x"], json!([1, 2]));
    }

    #[test]
    fn missing_marker_is_an_error() {
        let err = extractor()
            .extract("<html><body>Access denied</body></html>")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MarkerNotFound));
    }

    #[test]
    fn truncated_blob_is_an_error() {
        // The non-greedy match stops at the first `};` which cuts the object short.
        let page = r#"window.__WEB_CONTEXT__={pageManifest:{"a":{"b":1}};"#;
        let err = extractor().extract(page).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }
}
