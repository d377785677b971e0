//! Best-effort extraction of the rewrite result from a completion.
//!
//! The rule engine asks the inference service for structured function-call
//! output, but some gateway configurations answer in prose with JSON buried
//! inside. This module handles both shapes: strict parsing for structured
//! arguments, and a bounded balanced-brace scan plus schema coercion for
//! plain text. Total extraction failure degrades to "original text, no
//! violations" instead of failing the check.

use inference_client::CompletionOutput;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Reason recorded when the model flags a span without explaining it.
const DEFAULT_REASON: &str = "restricted claim";

// ============================================================================
// Result shapes
// ============================================================================

/// Structured result the rule engine is asked to report.
///
/// This type exists for schema generation; lenient parsing goes through
/// [`coerce_rewrite`] instead.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RewriteResponse {
    /// Compliant rewrite of the input text
    pub modified: String,
    /// Spans of the ORIGINAL text that violate dictionary rules
    pub violations: Vec<RewriteViolation>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RewriteViolation {
    /// Character offset where the violating phrase starts
    pub start: u32,
    /// Character offset just past the violating phrase
    pub end: Option<u32>,
    /// Why the phrase violates the dictionary
    pub reason: Option<String>,
    /// Id of the matched dictionary entry, if any
    pub dictionary_id: Option<String>,
}

/// Final, clamped pipeline result.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    pub modified: String,
    pub violations: Vec<ViolationSpan>,
}

/// A violation span with offsets clamped into the original text.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationSpan {
    pub start: usize,
    pub end: usize,
    pub reason: String,
    pub dictionary_entry_id: Option<Uuid>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Resolve a completion into a rewrite outcome, never failing.
pub fn parse_rewrite(output: &CompletionOutput, original: &str) -> RewriteOutcome {
    match output {
        CompletionOutput::Structured(args) => {
            coerce_rewrite(args, original).unwrap_or_else(|| unmodified(original))
        }
        CompletionOutput::Text(content) => {
            let cleaned = strip_code_fences(content);
            find_json_object(cleaned)
                .and_then(|json| serde_json::from_str::<Value>(json).ok())
                .and_then(|value| coerce_rewrite(&value, original))
                .unwrap_or_else(|| unmodified(original))
        }
    }
}

/// The degraded outcome: text passed through untouched.
fn unmodified(original: &str) -> RewriteOutcome {
    RewriteOutcome {
        modified: original.to_string(),
        violations: Vec::new(),
    }
}

/// Coerce a JSON value into a rewrite outcome with plausible defaults.
///
/// `modified` defaults to the original text; a missing `end` defaults to the
/// full text length in characters. Spans are clamped into `[0, len]` and
/// degenerate spans (`start >= end`) are dropped, preserving the
/// `0 <= start < end <= len` invariant on everything that survives.
pub fn coerce_rewrite(value: &Value, original: &str) -> Option<RewriteOutcome> {
    let object = value.as_object()?;
    let text_len = original.chars().count();

    let modified = object
        .get("modified")
        .and_then(|m| m.as_str())
        .unwrap_or(original)
        .to_string();

    let mut violations = Vec::new();
    if let Some(items) = object.get("violations").and_then(|v| v.as_array()) {
        for item in items {
            let Some(fields) = item.as_object() else {
                continue;
            };
            let start = fields.get("start").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let end = fields
                .get("end")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(text_len);

            let end = end.min(text_len);
            if start >= end {
                continue;
            }

            let reason = fields
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_REASON)
                .to_string();
            let dictionary_entry_id = fields
                .get("dictionary_id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok());

            violations.push(ViolationSpan {
                start,
                end,
                reason,
                dictionary_entry_id,
            });
        }
    }

    Some(RewriteOutcome {
        modified,
        violations,
    })
}

/// Find the first balanced JSON object in free-form text.
///
/// Scans from the first `{`, tracking brace depth and skipping over string
/// literals (including escapes). Returns the exact slice of the object, or
/// `None` when no balanced object exists.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Strip markdown code fences around a response.
fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_without_json_falls_back_to_original() {
        let output = CompletionOutput::Text("I cannot find any issues with this copy.".into());
        let outcome = parse_rewrite(&output, "our original text");

        assert_eq!(outcome.modified, "our original text");
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn json_embedded_in_prose_is_extracted() {
        let output = CompletionOutput::Text(
            "Here is my analysis:\n\
             {\"modified\": \"better text\", \"violations\": [{\"start\": 0, \"end\": 4, \"reason\": \"absolute claim\"}]}\n\
             Let me know if you need more."
                .into(),
        );
        let outcome = parse_rewrite(&output, "best product ever");

        assert_eq!(outcome.modified, "better text");
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].start, 0);
        assert_eq!(outcome.violations[0].end, 4);
        assert_eq!(outcome.violations[0].reason, "absolute claim");
    }

    #[test]
    fn fenced_json_is_extracted() {
        let output =
            CompletionOutput::Text("```json\n{\"modified\": \"ok\", \"violations\": []}\n```".into());
        let outcome = parse_rewrite(&output, "text");
        assert_eq!(outcome.modified, "ok");
    }

    #[test]
    fn structured_arguments_parse_directly() {
        let output = CompletionOutput::Structured(json!({
            "modified": "a gentler claim",
            "violations": [
                {"start": 3, "end": 10, "reason": "guarantee", "dictionary_id": "8c0f6cde-86cd-4b4c-a3ef-3bb98d3ab1a3"}
            ]
        }));
        let outcome = parse_rewrite(&output, "we guarantee results");

        assert_eq!(outcome.modified, "a gentler claim");
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].dictionary_entry_id.is_some());
    }

    #[test]
    fn missing_end_defaults_to_full_text_length() {
        let original = "héllo wörld"; // 11 characters, more bytes
        let value = json!({
            "modified": "hi",
            "violations": [{"start": 2, "reason": "cut short"}]
        });
        let outcome = coerce_rewrite(&value, original).unwrap();

        assert_eq!(outcome.violations[0].end, 11);
    }

    #[test]
    fn spans_are_clamped_and_degenerate_spans_dropped() {
        let value = json!({
            "modified": "x",
            "violations": [
                {"start": 0, "end": 999, "reason": "overshoot"},
                {"start": 7, "end": 3, "reason": "inverted"},
                {"start": 4, "end": 4, "reason": "empty"}
            ]
        });
        let outcome = coerce_rewrite(&value, "ten chars!").unwrap();

        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].end, 10);
    }

    #[test]
    fn missing_reason_gets_a_plausible_default() {
        let value = json!({"violations": [{"start": 0, "end": 3}]});
        let outcome = coerce_rewrite(&value, "abcdef").unwrap();

        assert_eq!(outcome.modified, "abcdef");
        assert_eq!(outcome.violations[0].reason, DEFAULT_REASON);
    }

    #[test]
    fn balanced_scan_handles_braces_inside_strings() {
        let text = r#"noise {"modified": "keep {this} intact", "violations": []} trailing"#;
        let object = find_json_object(text).unwrap();
        let value: Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["modified"], "keep {this} intact");
    }

    #[test]
    fn balanced_scan_handles_escaped_quotes() {
        let text = r#"{"modified": "she said \"hi\"", "violations": []}"#;
        let object = find_json_object(text).unwrap();
        let value: Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["modified"], "she said \"hi\"");
    }

    #[test]
    fn unbalanced_braces_yield_none() {
        assert!(find_json_object("{\"modified\": \"never closed\"").is_none());
        assert!(find_json_object("no braces at all").is_none());
    }

    #[test]
    fn invalid_dictionary_id_is_ignored() {
        let value = json!({
            "violations": [{"start": 0, "end": 2, "dictionary_id": "not-a-uuid"}]
        });
        let outcome = coerce_rewrite(&value, "abcd").unwrap();
        assert!(outcome.violations[0].dictionary_entry_id.is_none());
    }
}
