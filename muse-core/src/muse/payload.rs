//! Best-effort JSON parsing for model output.
//!
//! Models are asked for bare JSON but sometimes wrap it in markdown fences
//! or surrounding prose. Parsing is an explicit two-step: strip fences and
//! try a strict parse, then salvage by locating the first brace-balanced
//! object in the text. Only when both steps fail does the batch fail.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// How much of the offending payload to keep in error messages.
const EXCERPT_LEN: usize = 120;

/// The model's output could not be parsed, even after the salvage pass.
#[derive(Debug, Error)]
#[error("failed to parse model output: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(error: &serde_json::Error, payload: &str) -> Self {
        Self {
            message: format!("{error}: {}", excerpt(payload)),
        }
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > EXCERPT_LEN {
        let cut: String = trimmed.chars().take(EXCERPT_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Strip markdown code fences from a response.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks (without json specifier)
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// Find the first brace-balanced JSON object embedded in text.
///
/// String-literal aware: braces inside quoted strings (including escaped
/// quotes) do not affect the depth count.
pub fn find_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    // Slice bounds land on ASCII braces, so this is safe.
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse model output leniently: strict parse first, then salvage the first
/// embedded JSON object.
pub fn parse_relaxed<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let candidate = strip_fences(raw);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(strict_err) => match find_balanced_object(candidate) {
            Some(object) => {
                serde_json::from_str(object).map_err(|e| ParseError::new(&e, object))
            }
            None => Err(ParseError::new(&strict_err, candidate)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_strict_parse() {
        let parsed: Sample = parse_relaxed(r#"{"name": "Maria", "count": 3}"#).unwrap();
        assert_eq!(parsed.name, "Maria");
        assert_eq!(parsed.count, 3);
    }

    #[test]
    fn test_fenced_parse() {
        let raw = "```json\n{\"name\": \"Maria\"}\n```";
        let parsed: Sample = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.name, "Maria");
    }

    #[test]
    fn test_fence_without_specifier() {
        let raw = "```\n{\"name\": \"Tomas\"}\n```";
        let parsed: Sample = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.name, "Tomas");
    }

    #[test]
    fn test_salvage_from_prose() {
        let raw = r#"Here is what I found: {"name": "Maria", "count": 2} — hope that helps!"#;
        let parsed: Sample = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.name, "Maria");
        assert_eq!(parsed.count, 2);
    }

    #[test]
    fn test_salvage_handles_braces_in_strings() {
        let raw = r#"Sure: {"name": "a { tricky } name"} trailing"#;
        let parsed: Sample = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.name, "a { tricky } name");
    }

    #[test]
    fn test_salvage_handles_escaped_quotes() {
        let raw = r#"{"name": "she said \"hi\" {twice}"}"#;
        let parsed: Sample = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.name, r#"she said "hi" {twice}"#);
    }

    #[test]
    fn test_nested_objects() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            inner: Sample,
        }
        let raw = r#"noise {"inner": {"name": "x"}} noise"#;
        let parsed: Outer = parse_relaxed(raw).unwrap();
        assert_eq!(parsed.inner.name, "x");
    }

    #[test]
    fn test_no_json_at_all() {
        let err = parse_relaxed::<Sample>("I could not extract anything.").unwrap_err();
        assert!(err.message.contains("could not extract"));
    }

    #[test]
    fn test_unbalanced_object_fails() {
        let err = parse_relaxed::<Sample>(r#"{"name": "Maria""#).unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_error_excerpt_is_bounded() {
        let long = format!("not json {}", "x".repeat(500));
        let err = parse_relaxed::<Sample>(&long).unwrap_err();
        assert!(err.message.len() < 300);
    }
}
