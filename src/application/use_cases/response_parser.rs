//! Extraction of structured payloads from model completions.
//!
//! Completions are free text. The analyzer expects a JSON object somewhere
//! in it; the synthesizer expects a SQL statement, ideally fenced. Both
//! extractors are tolerant of surrounding prose.

use crate::domain::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```sql\s*(.*?)```").unwrap()
});

static SELECT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bSELECT\b.*?(?:;|$)").unwrap()
});

/// Find a JSON object in a completion and parse it.
///
/// Tries the whole text first (after stripping code fences), then falls
/// back to the first balanced `{...}` span. Returns `UnparseableResponse`
/// when neither yields an object.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    let stripped = strip_fences(text);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stripped.trim()) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let Some(span) = first_balanced_object(&stripped) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(span) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    Err(AppError::UnparseableResponse(
        "no JSON object found in completion".to_string(),
    ))
}

/// Pull a SQL statement out of a completion.
///
/// Preference order: a ```sql fence, then the first `SELECT ...` span up to
/// a semicolon or end of text, then the trimmed completion verbatim. The
/// verbatim fallback means this never fails; the safety gate downstream is
/// what decides whether the result is usable.
pub fn extract_sql(text: &str) -> String {
    if let Some(captures) = SQL_FENCE.captures(text) {
        return captures[1].trim().to_string();
    }

    if let Some(found) = SELECT_SPAN.find(text) {
        return found.as_str().trim_end_matches(';').trim().to_string();
    }

    text.trim().to_string()
}

fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        return rest.trim_end_matches("```").to_string();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        return rest.trim_end_matches("```").to_string();
    }
    trimmed.to_string()
}

/// First `{...}` span with balanced braces, ignoring braces inside string
/// literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain_object() {
        let value = extract_json(r#"{"type": "statistical", "confidence": 0.9}"#).unwrap();
        assert_eq!(value["type"], "statistical");
    }

    #[test]
    fn test_extract_json_fenced() {
        let value = extract_json("```json\n{\"intent\": \"count rows\"}\n```").unwrap();
        assert_eq!(value["intent"], "count rows");
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let text = "Here is the analysis you asked for:\n{\"type\": \"general\", \"note\": \"has {braces} in string\"}\nHope that helps.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["type"], "general");
    }

    #[test]
    fn test_extract_json_rejects_plain_prose() {
        let err = extract_json("I could not analyze that question.").unwrap_err();
        assert!(matches!(err, AppError::UnparseableResponse(_)));
    }

    #[test]
    fn test_extract_json_rejects_bare_array() {
        assert!(extract_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_extract_sql_prefers_fence() {
        let text = "Sure!\n```sql\nSELECT COUNT(*) AS n FROM orders\n```\nThis counts the orders.";
        assert_eq!(extract_sql(text), "SELECT COUNT(*) AS n FROM orders");
    }

    #[test]
    fn test_extract_sql_select_span_without_fence() {
        let text = "The query is SELECT id FROM orders LIMIT 10; and it limits output.";
        assert_eq!(extract_sql(text), "SELECT id FROM orders LIMIT 10");
    }

    #[test]
    fn test_extract_sql_verbatim_fallback() {
        assert_eq!(extract_sql("  not sql at all  "), "not sql at all");
    }
}
