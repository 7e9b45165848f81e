//! Untrusted model output → guaranteed-valid JSON.
//!
//! Language models wrap answers in decorative code fences, prepend prose, or
//! emit truncated garbage. `sanitize` strips fences, re-parses the remainder
//! as a string-keyed JSON object and re-serializes it canonically. Anything
//! that does not survive the round trip degrades to the empty object `"{}"` —
//! the caller always receives structurally valid JSON, trading completeness
//! for robustness.

use serde_json::{Map, Value};

/// Normalize raw model output into a valid JSON object string.
///
/// Total: never fails, never returns non-JSON. Idempotent: applying it to its
/// own output is the identity.
pub fn sanitize(raw: &str) -> String {
    let candidate = strip_fences(raw).trim();
    match serde_json::from_str::<Map<String, Value>>(candidate) {
        Ok(map) => Value::Object(map).to_string(),
        Err(_) => String::from("{}"),
    }
}

/// Extract the content of the first fenced block, if any.
///
/// A `json`-tagged fence wins over a generic one. A fence without a closing
/// marker yields everything after the opener.
fn strip_fences(text: &str) -> &str {
    if let Some(inner) = fenced_content(text, "```json") {
        return inner;
    }
    if let Some(inner) = fenced_content(text, "```") {
        return inner;
    }
    text
}

fn fenced_content<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    match rest.find("```") {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses_as_object(s: &str) -> bool {
        serde_json::from_str::<Map<String, Value>>(s).is_ok()
    }

    #[test]
    fn passes_through_clean_json() {
        let out = sanitize("{\"a\":1}");
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn strips_json_tagged_fence() {
        let out = sanitize("```json\n{\"a\":1}\n```");
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn strips_generic_fence() {
        let out = sanitize("Here you go:\n```\n{\"ok\":true}\n```\nanything else");
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            serde_json::json!({"ok": true})
        );
    }

    #[test]
    fn unclosed_fence_still_extracts() {
        let out = sanitize("```json\n{\"a\":null}");
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            serde_json::json!({"a": null})
        );
    }

    #[test]
    fn non_json_prose_falls_back_to_empty_object() {
        assert_eq!(sanitize("not json at all"), "{}");
    }

    #[test]
    fn empty_input_falls_back_to_empty_object() {
        assert_eq!(sanitize(""), "{}");
    }

    #[test]
    fn fence_without_json_inside_falls_back() {
        assert_eq!(sanitize("```\nhello world\n```"), "{}");
    }

    #[test]
    fn trailing_prose_after_closing_brace_falls_back() {
        assert_eq!(sanitize("{\"a\":1} thank you!"), "{}");
    }

    #[test]
    fn top_level_array_is_rejected() {
        assert_eq!(sanitize("[1,2,3]"), "{}");
    }

    #[test]
    fn nested_structures_survive() {
        let raw = "{\"person\":{\"name\":\"Ana\",\"tags\":[\"a\",\"b\"],\"meta\":{\"depth\":{\"level\":3}}},\"ok\":true,\"n\":1.5,\"none\":null}";
        let out = sanitize(raw);
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            serde_json::from_str::<Value>(raw).unwrap()
        );
    }

    #[test]
    fn unicode_content_survives() {
        let out = sanitize("```json\n{\"city\":\"東京\",\"greeting\":\"¡hola!\"}\n```");
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["city"], "東京");
        assert_eq!(value["greeting"], "¡hola!");
    }

    #[test]
    fn idempotent_on_arbitrary_inputs() {
        let inputs = [
            "",
            "{}",
            "{\"a\":1}",
            "```json\n{\"a\":1}\n```",
            "garbage ``` {\"x\": ",
            "{\"b\":[1,{\"c\":null}]}",
            "just words",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn total_over_awkward_inputs() {
        let inputs = [
            "\u{0}\u{1}",
            "```",
            "``````",
            "```json",
            "{\"a\":",
            "   \n\t ",
            "{\"truncated",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(parses_as_object(&out), "non-JSON output for {input:?}");
        }
    }
}
