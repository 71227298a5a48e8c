//! Reasoning content extraction
//!
//! Models expose their intermediate "thinking" in different ways: a dedicated
//! message field (`reasoning_content`, `thinking`), inline tags such as
//! `<think>...</think>`, or only a token count in usage. [`extract_reasoning`]
//! tries each in a fixed order and the first strategy that applies wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag names recognized around reasoning text, in priority order
pub const REASONING_TAGS: [&str; 4] = ["think", "thinking", "reasoning", "analysis"];

static TAG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    REASONING_TAGS
        .iter()
        .filter_map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>"))
                .ok()
                .map(|re| (*tag, re))
        })
        .collect()
});

/// How reasoning was found in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Explicit reasoning field on the message
    NativeField,
    /// Inline reasoning tags in the content
    TagPattern,
    /// Usage reported hidden reasoning tokens only
    TokenCount,
    None,
}

/// Final content separated from reasoning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningExtraction {
    pub content: String,
    pub reasoning: Option<String>,
    pub method: ExtractionMethod,
}

impl ReasoningExtraction {
    fn plain(content: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
            method,
        }
    }

    pub fn into_parts(self) -> (String, Option<String>) {
        (self.content, self.reasoning)
    }
}

/// A reasoning tag whose opening and closing counts disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedTag {
    pub tag: String,
    pub open_count: usize,
    pub close_count: usize,
}

fn count_tag(haystack_lower: &str, tag: &str) -> (usize, usize) {
    let open = haystack_lower.matches(&format!("<{}>", tag)).count();
    let close = haystack_lower.matches(&format!("</{}>", tag)).count();
    (open, close)
}

/// Separate reasoning from a full OpenAI-style response
///
/// Reads `choices[0].message`. Missing or malformed fields mean "no
/// reasoning", never an error.
pub fn extract_reasoning(response: &Value) -> ReasoningExtraction {
    let Some(choice) = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return ReasoningExtraction::plain("", ExtractionMethod::None);
    };

    let message = choice.get("message").unwrap_or(&Value::Null);
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    for field in ["reasoning_content", "thinking"] {
        if let Some(native) = message.get(field) {
            let reasoning = match native {
                Value::Null => None,
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            };
            return ReasoningExtraction {
                content: content.to_string(),
                reasoning,
                method: ExtractionMethod::NativeField,
            };
        }
    }

    if content.is_empty() {
        return ReasoningExtraction::plain("", ExtractionMethod::None);
    }

    let tagged = extract_from_text(content);
    if tagged.method == ExtractionMethod::TagPattern {
        return tagged;
    }

    if reasoning_tokens(response).unwrap_or(0) > 0 {
        return ReasoningExtraction::plain(content, ExtractionMethod::TokenCount);
    }

    ReasoningExtraction::plain(content, ExtractionMethod::None)
}

/// Tag-pattern extraction on bare text
///
/// Only the first tag type in [`REASONING_TAGS`] order with a well-formed
/// pairing is processed; every occurrence of that tag is removed from the
/// returned content.
pub fn extract_from_text(content: &str) -> ReasoningExtraction {
    if content.is_empty() {
        return ReasoningExtraction::plain("", ExtractionMethod::None);
    }

    let lower = content.to_ascii_lowercase();
    for (tag, pattern) in TAG_PATTERNS.iter() {
        let (open, close) = count_tag(&lower, tag);
        if open != close {
            continue;
        }

        let Some(captures) = pattern.captures(content) else {
            continue;
        };
        let reasoning = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let remaining = pattern.replace_all(content, "").trim().to_string();

        return ReasoningExtraction {
            content: remaining,
            reasoning: Some(reasoning),
            method: ExtractionMethod::TagPattern,
        };
    }

    ReasoningExtraction::plain(content, ExtractionMethod::None)
}

/// `usage.completion_tokens_details.reasoning_tokens`, if reported
pub fn reasoning_tokens(response: &Value) -> Option<u64> {
    response
        .get("usage")?
        .get("completion_tokens_details")?
        .get("reasoning_tokens")?
        .as_u64()
}

/// Report each reasoning tag type whose open and close counts differ
pub fn detect_malformed_tags(content: &str) -> Vec<MalformedTag> {
    let lower = content.to_ascii_lowercase();
    REASONING_TAGS
        .iter()
        .filter_map(|tag| {
            let (open_count, close_count) = count_tag(&lower, tag);
            (open_count != close_count).then(|| MalformedTag {
                tag: tag.to_string(),
                open_count,
                close_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(message: Value) -> Value {
        json!({"choices": [{"message": message, "finish_reason": "stop"}]})
    }

    #[test]
    fn test_native_field_wins() {
        let r = extract_reasoning(&response(json!({
            "content": "<think>ignored</think>The answer is 4",
            "reasoning_content": "2 + 2 = 4"
        })));
        assert_eq!(r.method, ExtractionMethod::NativeField);
        assert_eq!(r.reasoning.as_deref(), Some("2 + 2 = 4"));
        assert_eq!(r.content, "<think>ignored</think>The answer is 4");

        let r = extract_reasoning(&response(json!({"content": "4", "thinking": "adding"})));
        assert_eq!(r.reasoning.as_deref(), Some("adding"));
    }

    #[test]
    fn test_tag_pattern_extraction() {
        let r = extract_reasoning(&response(json!({
            "content": "<think>\n  Let me add.\n</think>\n\nThe answer is 4."
        })));
        assert_eq!(r.method, ExtractionMethod::TagPattern);
        assert_eq!(r.reasoning.as_deref(), Some("Let me add."));
        assert_eq!(r.content, "The answer is 4.");
    }

    #[test]
    fn test_tag_pattern_case_insensitive_and_first_match_only() {
        let r = extract_from_text("<THINKING>first</THINKING> middle <analysis>second</analysis> end");
        assert_eq!(r.reasoning.as_deref(), Some("first"));
        assert_eq!(r.content, "middle <analysis>second</analysis> end");
    }

    #[test]
    fn test_all_occurrences_removed() {
        let r = extract_from_text("<think>a</think>one <think>b</think>two");
        assert_eq!(r.reasoning.as_deref(), Some("a"));
        assert_eq!(r.content, "one two");
    }

    #[test]
    fn test_mismatched_tags_left_alone() {
        let text = "<think>unclosed <think>nested</think> tail";
        let r = extract_from_text(text);
        assert_eq!(r.method, ExtractionMethod::None);
        assert_eq!(r.content, text);

        let malformed = detect_malformed_tags(text);
        assert_eq!(
            malformed,
            vec![MalformedTag {
                tag: "think".to_string(),
                open_count: 2,
                close_count: 1
            }]
        );
    }

    #[test]
    fn test_token_count_signal() {
        let r = extract_reasoning(&json!({
            "choices": [{"message": {"content": "42"}}],
            "usage": {"completion_tokens_details": {"reasoning_tokens": 128}}
        }));
        assert_eq!(r.method, ExtractionMethod::TokenCount);
        assert_eq!(r.content, "42");
        assert!(r.reasoning.is_none());
    }

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(extract_reasoning(&json!({})).into_parts(), (String::new(), None));
        assert_eq!(
            extract_reasoning(&json!({"choices": []})).into_parts(),
            (String::new(), None)
        );
        assert_eq!(
            extract_reasoning(&response(json!({"content": ""}))).into_parts(),
            (String::new(), None)
        );
        assert_eq!(
            extract_reasoning(&response(json!({"content": null}))).into_parts(),
            (String::new(), None)
        );
        assert!(detect_malformed_tags("no tags at all").is_empty());
    }
}
