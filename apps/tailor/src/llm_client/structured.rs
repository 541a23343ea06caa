//! Structured-response parsing: pulls one JSON object out of a completion that
//! is supposed to contain one, with a repair pass and per-context defaults.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Number of raw-text characters included in parse-failure logs.
const PREVIEW_CHARS: usize = 200;

pub type FallbackFn = fn() -> Value;

/// Per-context default responses, injected into the parser at construction.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    defaults: HashMap<&'static str, FallbackFn>,
}

impl FallbackRegistry {
    pub fn register(&mut self, context: &'static str, default: FallbackFn) {
        self.defaults.insert(context, default);
    }

    pub fn get(&self, context: &str) -> Option<Value> {
        self.defaults.get(context).map(|default| default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Direct,
    Repaired,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub value: Value,
    pub source: ParseSource,
}

#[derive(Clone, Default)]
pub struct ResponseParser {
    registry: FallbackRegistry,
}

impl ResponseParser {
    pub fn new(registry: FallbackRegistry) -> Self {
        Self { registry }
    }

    /// Tries, in order: strict decode, repaired decode, registered default.
    /// Returns `None` when all three fail. Never panics.
    pub fn parse(&self, raw: &str, context: &str) -> Option<ParsedResponse> {
        let text = strip_json_fences(raw);

        if text.is_empty() {
            warn!("[{}] empty model response", context);
        } else {
            match serde_json::from_str::<Value>(text) {
                Ok(value) if is_structured(&value) => {
                    return Some(ParsedResponse {
                        value,
                        source: ParseSource::Direct,
                    })
                }
                Ok(_) => warn!(
                    "[{}] response is not an object or array; raw: {}",
                    context,
                    preview(raw)
                ),
                Err(e) => warn!(
                    "[{}] JSON parse error: {}; raw: {}",
                    context,
                    e,
                    preview(raw)
                ),
            }

            let repaired = repair(text);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) if is_structured(&value) => {
                    debug!("[{}] response recovered by repair pass", context);
                    return Some(ParsedResponse {
                        value,
                        source: ParseSource::Repaired,
                    });
                }
                Ok(_) => warn!("[{}] repaired response is not an object", context),
                Err(e) => warn!("[{}] could not repair JSON: {}", context, e),
            }
        }

        match self.registry.get(context) {
            Some(value) => {
                warn!("[{}] using registered fallback response", context);
                Some(ParsedResponse {
                    value,
                    source: ParseSource::Fallback,
                })
            }
            None => None,
        }
    }
}

fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim()),
        None => text,
    }
}

// ─── Repair pass ─────────────────────────────────────────────────────────────

fn repair(text: &str) -> String {
    static TRAILING_COMMA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

    let quoted = single_to_double_quotes(text);
    let uncomma = TRAILING_COMMA_RE.replace_all(&quoted, "$1");
    match extract_object(&uncomma) {
        Some(object) => object.to_string(),
        None => uncomma.into_owned(),
    }
}

/// Rewrites `'token'` as `"token"` when neither the opening quote is preceded
/// by a letter nor the closing quote followed by one, so apostrophes inside
/// words (`don't`) are left alone.
fn single_to_double_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\'' && (i == 0 || !chars[i - 1].is_ascii_alphabetic()) {
            if let Some(offset) = chars[i + 1..].iter().position(|&c| c == '\'') {
                let close = i + 1 + offset;
                let followed_by_letter = chars
                    .get(close + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic());
                if !followed_by_letter {
                    out.push('"');
                    out.extend(&chars[i + 1..close]);
                    out.push('"');
                    i = close + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// The substring from the first `{` to its matching `}`, ignoring braces
/// inside string literals. Falls back to the last `}` when unbalanced.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser_with_default() -> ResponseParser {
        let mut registry = FallbackRegistry::default();
        registry.register("reorder_sections", || json!({"optimized_sections": ["experience"]}));
        ResponseParser::new(registry)
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_direct_parse() {
        let parsed = ResponseParser::default()
            .parse("```json\n{\"a\": 1}\n```", "any")
            .unwrap();
        assert_eq!(parsed.source, ParseSource::Direct);
        assert_eq!(parsed.value, json!({"a": 1}));
    }

    #[test]
    fn test_repairs_trailing_commas_and_prose() {
        let raw = "Sure! Here is the result:\n{\"skills\": [\"Python\", \"SQL\",],}\nHope that helps.";
        let parsed = ResponseParser::default().parse(raw, "tailor_skills").unwrap();
        assert_eq!(parsed.source, ParseSource::Repaired);
        assert_eq!(parsed.value, json!({"skills": ["Python", "SQL"]}));
    }

    #[test]
    fn test_repairs_single_quotes_but_not_apostrophes() {
        let raw = "{'summary': \"I don't stop\", 'count': 2}";
        let parsed = ResponseParser::default().parse(raw, "update_summary").unwrap();
        assert_eq!(parsed.source, ParseSource::Repaired);
        assert_eq!(parsed.value, json!({"summary": "I don't stop", "count": 2}));
    }

    #[test]
    fn test_bare_scalar_is_not_a_success() {
        assert!(ResponseParser::default().parse("42", "tailor_skills").is_none());
        assert!(ResponseParser::default().parse("\"text\"", "tailor_skills").is_none());
    }

    #[test]
    fn test_registered_fallback() {
        let parsed = parser_with_default()
            .parse("I cannot do that.", "reorder_sections")
            .unwrap();
        assert_eq!(parsed.source, ParseSource::Fallback);
        assert_eq!(parsed.value["optimized_sections"], json!(["experience"]));
    }

    #[test]
    fn test_unknown_context_without_fallback_is_none() {
        assert!(parser_with_default().parse("no json here", "tailor_projects").is_none());
        assert!(parser_with_default().parse("", "tailor_projects").is_none());
    }

    #[test]
    fn test_extract_object_ignores_braces_in_strings() {
        let text = "noise {\"a\": \"}\", \"b\": {\"c\": 1}} trailing }";
        assert_eq!(
            extract_object(text),
            Some("{\"a\": \"}\", \"b\": {\"c\": 1}}")
        );
    }
}
