//! Best-effort repair of raw LLM text into parseable JSON.
//!
//! The backend produces free text. Common defects: prose around the JSON,
//! fenced code blocks, a stray leading `json` token, literal control
//! characters inside string values, and unescaped LaTeX backslashes
//! (`\sigma`, `\lambda^2`). [`repair`] normalizes all of these without
//! ever failing; [`parse`] runs the repaired text through `serde_json` and
//! surfaces the raw text on failure.

use crate::{Error, Result};

/// Placeholder prefix for protected escape sequences. Private-use Unicode
/// so it cannot collide with LLM output.
const PROTECT: char = '\u{E000}';

/// The valid JSON escape sequences to protect before doubling lone
/// backslashes.
const VALID_ESCAPES: [(&str, char); 8] = [
    ("\\\\", '0'),
    ("\\\"", '1'),
    ("\\n", '2'),
    ("\\r", '3'),
    ("\\t", '4'),
    ("\\b", '5'),
    ("\\f", '6'),
    ("\\/", '7'),
];

/// Repairs raw LLM text into a string intended for a JSON parser.
///
/// Best-effort only; never fails. Callers that need a parsed value should
/// use [`parse`], which reports a distinct unparsable-response error when
/// repair is insufficient.
#[must_use]
pub fn repair(raw: &str) -> String {
    let candidate = extract_candidate(raw);
    let candidate = strip_json_token(candidate);
    let escaped = escape_control_chars_in_strings(candidate);
    normalize_backslashes(&escaped)
}

/// Repairs and parses raw LLM text.
///
/// # Errors
///
/// Returns [`Error::UnparsableResponse`] carrying the raw text when the
/// repaired text still fails to parse. Never silently substitutes an empty
/// object.
pub fn parse(operation: &str, raw: &str) -> Result<serde_json::Value> {
    let repaired = repair(raw);
    serde_json::from_str(&repaired).map_err(|e| {
        tracing::warn!(operation, error = %e, "LLM response unparsable after repair");
        Error::UnparsableResponse {
            operation: operation.to_string(),
            raw: raw.to_string(),
        }
    })
}

/// Extracts the JSON candidate substring.
///
/// Prefers a fenced block labeled `json`, then the substring from the first
/// `{` to the last `}`, then the trimmed original.
fn extract_candidate(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let body_start = start + 7;
        if let Some(end) = trimmed[body_start..].find("```") {
            return trimmed[body_start..body_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Strips a leading literal `json` token the LLM sometimes includes inside
/// the fence.
fn strip_json_token(candidate: &str) -> &str {
    candidate
        .strip_prefix("json")
        .map_or(candidate, str::trim_start)
}

/// Escapes literal control characters that appear inside quoted string
/// literals.
///
/// Tracks quote state and backslash escaping so structural whitespace
/// between tokens is left alone.
fn escape_control_chars_in_strings(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in candidate.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    out.push(c);
                    escaped = false;
                },
                '\\' => {
                    out.push(c);
                    escaped = true;
                },
                '"' => {
                    out.push(c);
                    in_string = false;
                },
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

/// Doubles lone backslashes (unescaped LaTeX sequences like `\theta`) while
/// leaving the eight valid JSON escape sequences intact.
///
/// Valid sequences are protected behind private-use placeholder tokens,
/// every remaining backslash is doubled, then the placeholders are
/// restored.
fn normalize_backslashes(text: &str) -> String {
    let mut working = text.to_string();
    for (seq, tag) in VALID_ESCAPES {
        working = working.replace(seq, &format!("{PROTECT}{tag}"));
    }
    working = working.replace('\\', "\\\\");
    for (seq, tag) in VALID_ESCAPES {
        working = working.replace(&format!("{PROTECT}{tag}"), seq);
    }
    working
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_raw_json_passthrough() {
        let raw = r#"{"key": "value"}"#;
        assert_eq!(repair(raw), raw);
    }

    #[test]
    fn test_repair_fenced_block() {
        let raw = "Here you go:\n```json\n{\"key\": \"value\"}\n```\nHope that helps!";
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_repair_brace_extraction() {
        let raw = "The plan is {\"title\": \"Bagging\"} as requested";
        assert_eq!(repair(raw), r#"{"title": "Bagging"}"#);
    }

    #[test]
    fn test_repair_strips_leading_json_token() {
        let raw = "json\n{\"a\": 1}";
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["a"], 1);
    }

    #[test]
    fn test_repair_escapes_newline_inside_string() {
        let raw = "{\"text\": \"line one\nline two\"}";
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["text"], "line one\nline two");
    }

    #[test]
    fn test_repair_preserves_structural_whitespace() {
        let raw = "{\n  \"a\": 1,\n  \"b\": 2\n}";
        let repaired = repair(raw);
        // Newlines between tokens are untouched.
        assert!(repaired.contains("{\n"));
        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn test_repair_doubles_latex_backslashes() {
        let raw = r#"{"formula": "\sigma = \lambda^2"}"#;
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["formula"], "\\sigma = \\lambda^2");
    }

    #[test]
    fn test_repair_latex_colliding_with_valid_escapes() {
        // `\t` and `\f` are valid JSON escapes, so `\theta` and `\frac` are
        // protected as-is and decode to control characters. The protect
        // list is exactly the eight valid sequences.
        let raw = r#"{"formula": "\theta"}"#;
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["formula"], "\theta");
    }

    #[test]
    fn test_repair_keeps_valid_escapes() {
        let raw = r#"{"text": "a\nb \"quoted\" c\\d"}"#;
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(parsed["text"], "a\nb \"quoted\" c\\d");
    }

    #[test]
    fn test_repair_latex_heavy_fenced_roundtrip() {
        // Repair followed by a standard parse must equal manual escaping.
        let raw = "```json\n{\"formula_bullets\": [{\"content\": \"$$\\sigma^2 = \\sum x_i$$\"}]}\n```";
        let parsed: serde_json::Value = serde_json::from_str(&repair(raw)).unwrap();
        let expected: serde_json::Value = serde_json::from_str(
            "{\"formula_bullets\": [{\"content\": \"$$\\\\sigma^2 = \\\\sum x_i$$\"}]}",
        )
        .unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_repair_no_json_returns_trimmed() {
        assert_eq!(repair("  not json at all  "), "not json at all");
    }

    #[test]
    fn test_parse_surfaces_raw_text() {
        let err = parse("generate_note", "I could not produce JSON today").unwrap_err();
        match err {
            crate::Error::UnparsableResponse { operation, raw } => {
                assert_eq!(operation, "generate_note");
                assert!(raw.contains("could not produce"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_success() {
        let value = parse("plan", "```json\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value["ok"], true);
    }
}
