//! Tolerant extraction of a JSON value from free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]+?)```").expect("valid regex"));
static FIRST_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]+\}").expect("valid regex"));
static FIRST_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[\s\S]+\]").expect("valid regex"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Pull a JSON value out of an LLM reply.
///
/// Tries, in order: the whole text, a fenced code block, the outermost
/// `{...}`, the outermost `[...]`, and finally a repaired object (trailing
/// commas dropped, single quotes swapped for double quotes).
pub fn parse_llm_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    if let Some(caps) = FENCED_BLOCK.captures(text)
        && let Ok(value) = serde_json::from_str(caps[1].trim())
    {
        return Some(value);
    }

    if let Some(m) = FIRST_OBJECT.find(text)
        && let Ok(value) = serde_json::from_str(m.as_str())
    {
        return Some(value);
    }

    if let Some(m) = FIRST_ARRAY.find(text)
        && let Ok(value) = serde_json::from_str(m.as_str())
    {
        return Some(value);
    }

    let repaired = TRAILING_COMMA.replace_all(text, "$1").replace('\'', "\"");
    FIRST_OBJECT
        .find(&repaired)
        .and_then(|m| serde_json::from_str(m.as_str()).ok())
}

/// Deserialize a typed payload out of an LLM reply.
pub fn parse_llm_payload<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, String> {
    let value = parse_llm_json(text).ok_or_else(|| {
        let preview: String = text.chars().take(120).collect();
        format!("no JSON found in reply: {preview:?}")
    })?;
    serde_json::from_value(value).map_err(|e| format!("reply JSON has the wrong shape: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_json() {
        assert_eq!(
            parse_llm_json(r#"  {"label": "POSITIVE", "confidence": 90}  "#),
            Some(json!({"label": "POSITIVE", "confidence": 90}))
        );
    }

    #[test]
    fn test_fenced_block() {
        let text = "Here you go:\n```json\n{\"label\": \"NEWS\"}\n```\nAnything else?";
        assert_eq!(parse_llm_json(text), Some(json!({"label": "NEWS"})));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let text = "Sure! {\"is_correct\": false, \"critique\": \"wrong entity\"} Hope that helps";
        assert_eq!(
            parse_llm_json(text),
            Some(json!({"is_correct": false, "critique": "wrong entity"}))
        );
    }

    #[test]
    fn test_array_embedded_in_prose() {
        assert_eq!(parse_llm_json("ids: [1, 2, 3] done"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_repairs_trailing_commas_and_single_quotes() {
        let text = "{'label': 'MIXED', 'confidence': 80,}";
        assert_eq!(
            parse_llm_json(text),
            Some(json!({"label": "MIXED", "confidence": 80}))
        );
    }

    #[test]
    fn test_garbage_yields_none() {
        assert_eq!(parse_llm_json(""), None);
        assert_eq!(parse_llm_json("I cannot label this."), None);
        assert_eq!(parse_llm_json("{not json at all}"), None);
    }

    #[test]
    fn test_typed_payload_reports_shape_errors() {
        #[derive(serde::Deserialize, Debug)]
        struct Out {
            #[allow(dead_code)]
            label: String,
        }
        let err = parse_llm_payload::<Out>(r#"{"confidence": 3}"#).unwrap_err();
        assert!(err.contains("wrong shape"));
        let err = parse_llm_payload::<Out>("nope").unwrap_err();
        assert!(err.contains("no JSON"));
        assert!(parse_llm_payload::<Out>(r#"{"label":"X"}"#).is_ok());
    }
}
