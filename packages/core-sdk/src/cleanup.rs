//! Response normalizer: coerces free-form model output into a JSON array of strings.
//!
//! Providers wrap their answers in markdown fences, chatty prefixes, almost-JSON
//! or plain bullet lists. [`clean_ai_response`] peels those layers off in a fixed
//! order and always returns valid JSON text encoding an array of strings.

use std::io;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::telemetry::preview;

const EMPTY_ARRAY: &str = "[]";

/// Lines this short after marker removal are stray punctuation, not items.
const MIN_LINE_CHARS: usize = 3;

// A language tag is only consumed when the fence line ends right after it.
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:[\w+\-]+[ \t]*)?\r?\n|```").expect("fence pattern compiles")
});

// Applied in order, each anchored at the start of the text. Prefix bodies never
// cross a bracket or brace so a JSON payload is never eaten.
static PREFIX_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^here\s+(?:is|are)\s+[^\[\{\n]*?:\s*",
        r"(?i)^(?:the\s+)?(?:historic\s+)?events?\s+(?:for\s+[^\[\{\n]*?\s+)?(?:are|include):\s*",
        r"(?i)^(?:based\s+on\s+[^\[\{\n]*?,?\s*)?(?:here\s+are\s+)?(?:the\s+)?(?:notable\s+)?(?:historic\s+)?events?\s*:\s*",
        r"(?i)^[^\[\{\n]*?(?:array|list)\s*:\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("prefix pattern compiles"))
    .collect()
});

// First `[...]`, allowing one level of nested brackets inside.
static EMBEDDED_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:[^\[\]]|\[[^\]]*\])*\]").expect("array pattern compiles"));

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern compiles"));
static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([^']*)'").expect("single quote pattern compiles"));
static BARE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{\s,])(\w+):").expect("bare key pattern compiles"));

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*•]\s*").expect("bullet pattern compiles"));
static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.\s*").expect("numbered pattern compiles"));
static NUMBERED_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\)\s*").expect("numbered paren pattern compiles"));

/**
 * \brief Cleans a raw provider reply into a JSON array of strings.
 * \param response_text raw text returned by the provider
 * \param provider      provider tag, only used for log attribution
 * \return JSON text; never fails, every failure path degrades to a one-item array
 */
pub fn clean_ai_response(response_text: &str, provider: &str) -> String {
    if response_text.is_empty() {
        return EMPTY_ARRAY.to_string();
    }

    match clean_stages(response_text, provider)
        .and_then(|items| to_json_text(&items).map_err(Into::into))
    {
        Ok(cleaned) => cleaned,
        Err(err) => {
            error!(
                provider,
                error = %err,
                original = %preview(response_text),
                "error cleaning response, wrapping original text"
            );
            single_item_array(response_text.trim())
        }
    }
}

fn clean_stages(response_text: &str, provider: &str) -> Result<Vec<String>> {
    let mut text = strip_code_fences(response_text);
    text = strip_prefixes(&text);

    if !parses_as_array(text.trim()) {
        if let Some(found) = EMBEDDED_ARRAY_RE.find(&text) {
            text = found.as_str().to_string();
        }
    }
    let text = text.trim();

    match serde_json::from_str::<Value>(text) {
        Ok(parsed) => return Ok(normalize_to_string_array(&parsed)?),
        Err(err) => {
            warn!(
                provider,
                error = %err,
                cleaned = %preview(text),
                "response is not valid JSON after cleaning"
            );
        }
    }

    let repaired = fix_common_json_issues(text);
    if let Ok(parsed) = serde_json::from_str::<Value>(&repaired) {
        debug!(provider, repaired = %preview(&repaired), "parsed response after JSON repair");
        return Ok(normalize_to_string_array(&parsed)?);
    }

    if !text.starts_with('[') {
        return Ok(parse_text_to_string_array(text));
    }

    let stage = if text.ends_with(']') {
        "unparseable array"
    } else {
        "unterminated array"
    };
    error!(
        provider,
        stage,
        original = %preview(response_text),
        attempted = %preview(text),
        "could not clean response, converting to single-item array"
    );
    Ok(vec![text.to_string()])
}

fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").into_owned()
}

fn strip_prefixes(text: &str) -> String {
    PREFIX_RES.iter().fold(text.to_string(), |acc, re| {
        re.replace(&acc, "").into_owned()
    })
}

fn parses_as_array(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::Array(_)))
}

/**
 * \brief Coerces any parsed JSON value into a list of non-empty strings.
 *
 * Arrays keep their order; nested objects and arrays become their JSON text.
 * Other scalars use their JSON spelling: `true`, `false`, `null`, and numbers
 * exactly as written in the source text.
 */
pub fn normalize_to_string_array(data: &Value) -> serde_json::Result<Vec<String>> {
    let items = match data {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let text = match item {
                    Value::String(s) => s.trim().to_string(),
                    Value::Object(_) | Value::Array(_) => to_json_text(item)?,
                    scalar => scalar_text(scalar),
                };
                if !text.is_empty() {
                    out.push(text);
                }
            }
            out
        }
        Value::Object(_) => vec![to_json_text(data)?],
        Value::String(s) => non_empty(s.trim()),
        scalar => non_empty(&scalar_text(scalar)),
    };
    Ok(items)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn non_empty(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![text.to_string()]
    }
}

/**
 * \brief Splits free text into list items, dropping bullet and numbering markers.
 */
pub fn parse_text_to_string_array(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let lines: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let line = BULLET_RE.replace(line, "");
            let line = NUMBERED_RE.replace(&line, "");
            let line = NUMBERED_PAREN_RE.replace(&line, "");
            let line = line.trim();
            (line.chars().count() > MIN_LINE_CHARS).then(|| line.to_string())
        })
        .collect();

    if lines.is_empty() {
        vec![text.to_string()]
    } else {
        lines
    }
}

/**
 * \brief Heuristic fix-up of almost-JSON text.
 *
 * Order matters: quotes are normalised before bare keys are quoted.
 * Key quoting is not scoped to object context and can touch string values
 * that contain `word:` after whitespace.
 */
pub fn fix_common_json_issues(json: &str) -> String {
    let fixed = TRAILING_COMMA_RE.replace_all(json, "${1}");
    let fixed = SINGLE_QUOTED_RE.replace_all(&fixed, "\"${1}\"");
    let fixed = BARE_KEY_RE.replace_all(&fixed, "${1}\"${2}\":");
    fixed.into_owned()
}

/**
 * \brief True when `response` is JSON text of an array whose items are all strings.
 */
pub fn validate_response_format(response: &str) -> bool {
    match serde_json::from_str::<Value>(response) {
        Ok(Value::Array(items)) => items.iter().all(Value::is_string),
        _ => false,
    }
}

/// serde_json formatter writing `, ` and `: ` separators; non-ASCII stays unescaped.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/**
 * \brief Serializes with `, ` / `: ` separators, the layout used for every
 * JSON string this module emits.
 */
pub fn to_json_text<T>(value: &T) -> serde_json::Result<String>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(serde::ser::Error::custom)
}

fn single_item_array(text: &str) -> String {
    to_json_text(&[text]).unwrap_or_else(|_| EMPTY_ARRAY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean(input: &str) -> Value {
        let out = clean_ai_response(input, "test");
        assert!(validate_response_format(&out), "invalid output {out:?} for {input:?}");
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn empty_input_is_empty_array() {
        assert_eq!(clean_ai_response("", "openai"), "[]");
        assert_eq!(clean("   \n "), json!([]));
    }

    #[test]
    fn clean_array_passes_through() {
        assert_eq!(
            clean_ai_response(r#"["Event 1", "Event 2"]"#, "openai"),
            r#"["Event 1", "Event 2"]"#
        );
        assert_eq!(clean(r#"[" Event 1 ", "", "Event 2"]"#), json!(["Event 1", "Event 2"]));
    }

    #[test]
    fn markdown_fences_are_stripped() {
        assert_eq!(clean("```json\n[\"Event 1\", \"Event 2\"]\n```"), json!(["Event 1", "Event 2"]));
        assert_eq!(clean("```\n[\"Event 1\"]\n```"), json!(["Event 1"]));
        assert_eq!(clean("```JSON\n[\"Event 1\"]```"), json!(["Event 1"]));
    }

    #[test]
    fn words_after_inline_backticks_survive() {
        assert_eq!(clean("[\"a ```b\"]"), json!(["a b"]));
        assert_eq!(clean("Use ```rust here"), json!(["Use rust here"]));
    }

    #[test]
    fn conversational_prefixes_are_stripped() {
        assert_eq!(
            clean(r#"Here are the events: ["Event 1", "Event 2"]"#),
            json!(["Event 1", "Event 2"])
        );
        assert_eq!(
            clean("The historic events for 1969 include: [\"Moon landing\"]"),
            json!(["Moon landing"])
        );
        assert_eq!(
            clean("Based on your request, here are the notable events:\n- Moon landing\n- Woodstock"),
            json!(["Moon landing", "Woodstock"])
        );
        assert_eq!(
            clean("Here is the JSON array:\n[\"Apollo 11\"]"),
            json!(["Apollo 11"])
        );
    }

    #[test]
    fn embedded_array_is_extracted_from_prose() {
        assert_eq!(
            clean(r#"Some intro text. ["Event 1", "Event 2"] Some outro."#),
            json!(["Event 1", "Event 2"])
        );
        assert_eq!(
            clean(r#"Result: [["a", "b"], "c"] done"#),
            json!([r#"["a", "b"]"#, "c"])
        );
    }

    #[test]
    fn malformed_json_is_repaired() {
        assert_eq!(clean(r#"["Event 1", "Event 2",]"#), json!(["Event 1", "Event 2"]));
        assert_eq!(clean("['Event 1', 'Event 2']"), json!(["Event 1", "Event 2"]));
        assert_eq!(
            clean("{event: 'Event 1',}"),
            json!([r#"{"event": "Event 1"}"#])
        );
    }

    #[test]
    fn plain_text_lists_become_items() {
        assert_eq!(clean("1. Event 1\n2. Event 2"), json!(["Event 1", "Event 2"]));
        assert_eq!(clean("- Event 1\n- Event 2"), json!(["Event 1", "Event 2"]));
        assert_eq!(clean("* Event 1\r\n• Event 2\n3) Event 3"), json!(["Event 1", "Event 2", "Event 3"]));
        assert_eq!(clean("Just a single event"), json!(["Just a single event"]));
    }

    #[test]
    fn objects_and_mixed_arrays_are_stringified() {
        assert_eq!(clean(r#"{"event": "Event 1"}"#), json!([r#"{"event": "Event 1"}"#]));
        assert_eq!(
            clean(r#"[{"event": "Event 1"}, {"event": "Event 2"}]"#),
            json!([r#"{"event": "Event 1"}"#, r#"{"event": "Event 2"}"#])
        );
        assert_eq!(
            clean(r#"["Event 1", 2, {"event": "Event 3"}]"#),
            json!(["Event 1", "2", r#"{"event": "Event 3"}"#])
        );
        assert_eq!(clean("[true, null, 1.5]"), json!(["true", "null", "1.5"]));
    }

    #[test]
    fn object_keys_keep_source_order() {
        assert_eq!(
            clean(r#"[{"year": 1969, "event": "Moon landing"}]"#),
            json!([r#"{"year": 1969, "event": "Moon landing"}"#])
        );
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let out = clean_ai_response(r#"["Révolution française", "明治維新"]"#, "gemini");
        assert_eq!(out, r#"["Révolution française", "明治維新"]"#);
    }

    #[test]
    fn unparseable_array_falls_back_to_single_item() {
        assert_eq!(clean(r#"["Event 1", "Event 2""#), json!([r#"["Event 1", "Event 2""#]));
        assert_eq!(clean(r#"[Event 1, Event 2]"#), json!(["[Event 1, Event 2]"]));
    }

    #[test]
    fn output_is_idempotent() {
        let inputs = [
            r#"["Event 1", "Event 2"]"#,
            "```json\n[\"Event 1\"]\n```",
            "1. Event 1\n2. Event 2",
            r#"["Event 1", 2, {"event": "Event 3"}]"#,
            r#"[Event 1, Event 2]"#,
            r#"["Event 1", "Event 2""#,
            "Just a single event",
            "{\"a\": [1, 2]}",
            "42",
            "",
        ];
        for input in inputs {
            let once = clean_ai_response(input, "test");
            let twice = clean_ai_response(&once, "test");
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn scalars_coerce_to_single_items() {
        assert_eq!(normalize_to_string_array(&json!("  hi ")).unwrap(), vec!["hi"]);
        assert!(normalize_to_string_array(&json!("   ")).unwrap().is_empty());
        assert_eq!(normalize_to_string_array(&json!(42)).unwrap(), vec!["42"]);
        assert_eq!(normalize_to_string_array(&json!(false)).unwrap(), vec!["false"]);
        assert_eq!(normalize_to_string_array(&Value::Null).unwrap(), vec!["null"]);
    }

    #[test]
    fn wide_integers_keep_their_digits() {
        assert_eq!(
            clean_ai_response("[12345678901234567890123, 1.50]", "test"),
            r#"["12345678901234567890123", "1.50"]"#
        );
    }

    #[test]
    fn short_lines_are_dropped_unless_nothing_survives() {
        assert_eq!(
            parse_text_to_string_array("1. ok\n2. Moon landing\n-\n"),
            vec!["Moon landing"]
        );
        assert_eq!(parse_text_to_string_array("  ok  "), vec!["ok"]);
        assert!(parse_text_to_string_array(" \n ").is_empty());
    }

    #[test]
    fn repair_rules_apply_in_order() {
        assert_eq!(fix_common_json_issues("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(fix_common_json_issues("{'a': 'b',}"), r#"{"a": "b"}"#);
        assert_eq!(fix_common_json_issues("{a: 1, b: 2}"), r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn validator_requires_array_of_strings() {
        assert!(validate_response_format("[]"));
        assert!(validate_response_format(r#"["a", "b"]"#));
        assert!(!validate_response_format(r#"["a", 1]"#));
        assert!(!validate_response_format(r#"{"a": "b"}"#));
        assert!(!validate_response_format("not json"));
    }
}
