//! Reasoning extraction properties

use serde_json::json;
use unillm::llm::reasoning::{detect_malformed_tags, extract_from_text, reasoning_tokens};
use unillm::llm::{extract_reasoning, ExtractionMethod};

fn response(message: serde_json::Value) -> serde_json::Value {
    json!({"choices": [{"message": message}]})
}

#[test]
fn test_native_field_returned_unchanged() {
    let extraction = extract_reasoning(&response(json!({
        "content": "The answer is 4. <think>not touched</think>",
        "reasoning_content": "  2 + 2 = 4  "
    })));

    assert_eq!(extraction.method, ExtractionMethod::NativeField);
    assert_eq!(extraction.reasoning.as_deref(), Some("  2 + 2 = 4  "));
    assert_eq!(extraction.content, "The answer is 4. <think>not touched</think>");
}

#[test]
fn test_single_tag_pair() {
    let extraction = extract_from_text("Before <think>\n  weigh options \n</think> after");
    assert_eq!(extraction.method, ExtractionMethod::TagPattern);
    assert_eq!(extraction.reasoning.as_deref(), Some("weigh options"));
    assert!(extraction.content.contains("Before"));
    assert!(extraction.content.contains("after"));
    assert!(!extraction.content.contains("weigh options"));
}

#[test]
fn test_first_span_becomes_reasoning() {
    let extraction = extract_from_text("<think>one</think>middle<think>two</think>");
    assert_eq!(extraction.reasoning.as_deref(), Some("one"));
    assert_eq!(extraction.content, "middle");
}

#[test]
fn test_empty_and_missing_content() {
    let empty = extract_reasoning(&response(json!({"content": ""})));
    assert_eq!(empty.content, "");
    assert!(empty.reasoning.is_none());

    for malformed in [json!({}), json!({"choices": []}), json!({"choices": "nope"}), json!(null)] {
        let extraction = extract_reasoning(&malformed);
        assert_eq!(extraction.content, "");
        assert!(extraction.reasoning.is_none());
    }
}

#[test]
fn test_token_count_only() {
    let raw = json!({
        "choices": [{"message": {"content": "42"}}],
        "usage": {"completion_tokens_details": {"reasoning_tokens": 128}}
    });
    let extraction = extract_reasoning(&raw);
    assert_eq!(extraction.method, ExtractionMethod::TokenCount);
    assert_eq!(extraction.content, "42");
    assert!(extraction.reasoning.is_none());
    assert_eq!(reasoning_tokens(&raw), Some(128));
}

#[test]
fn test_mismatched_tags_are_reported_not_raised() {
    let text = "<think>unclosed <reasoning>x</reasoning></reasoning>";
    let extraction = extract_from_text(text);
    assert_eq!(extraction.method, ExtractionMethod::None);
    assert_eq!(extraction.content, text);

    let problems = detect_malformed_tags(text);
    let think = problems.iter().find(|p| p.tag == "think").unwrap();
    assert_eq!((think.open_count, think.close_count), (1, 0));
    let reasoning = problems.iter().find(|p| p.tag == "reasoning").unwrap();
    assert_eq!((reasoning.open_count, reasoning.close_count), (1, 2));

    assert!(detect_malformed_tags("<think>ok</think>").is_empty());
}
