//! Stream normalization
//!
//! Providers decode each raw stream event into a [`StreamDelta`]. A per-call
//! [`StreamNormalizer`] turns the sequence of deltas into [`ChatStreamChunk`]s:
//!
//! - reasoning tags in the content channel switch between `Normal` and
//!   `Reasoning` mode, even when a tag is split across events
//! - native reasoning deltas bypass tag detection
//! - tool-call fragments accumulate by id until the stream finishes
//! - the first `finish_reason` ends the stream; later events are ignored
//!
//! ```
//! use unillm::llm::streaming::{StreamDelta, StreamNormalizer};
//!
//! let mut normalizer = StreamNormalizer::new(true, true);
//! let mut content = String::new();
//! let mut reasoning = String::new();
//!
//! for piece in ["<thi", "nk>reasoning here</thi", "nk>rest of answer"] {
//!     if let Some(chunk) = normalizer.push(StreamDelta::content(piece)) {
//!         content.push_str(&chunk.content_delta);
//!         reasoning.push_str(chunk.reasoning_delta.as_deref().unwrap_or(""));
//!     }
//! }
//! if let Some(chunk) = normalizer.finish() {
//!     content.push_str(&chunk.content_delta);
//! }
//!
//! assert_eq!(reasoning, "reasoning here");
//! assert_eq!(content, "rest of answer");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

use super::reasoning::REASONING_TAGS;
use super::traits::ChatStreamChunk;
use crate::types::ToolCall;

/// One tool-call fragment from a stream event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Provider's positional index, used when later fragments omit the id
    pub index: Option<u64>,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Full arguments, replacing anything accumulated so far
    pub arguments: Option<String>,
    /// Arguments fragment appended to the accumulated arguments
    pub arguments_delta: Option<String>,
}

/// A raw stream event decoded into provider-neutral pieces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub content: Option<String>,
    /// Reasoning from a dedicated provider field
    pub native_reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl StreamDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            native_reasoning: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_call(mut self, delta: ToolCallDelta) -> Self {
        self.tool_calls.push(delta);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Which channel content text is currently routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    #[default]
    Normal,
    Reasoning,
    Done,
}

/// Cross-event state of one stream call
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    mode: StreamMode,
    /// Tag name whose closing tag ends the current reasoning span
    active_tag: Option<&'static str>,
    /// Trailing text that may be the start of a tag
    held: String,
    tool_calls: Vec<ToolCall>,
    positions: HashMap<String, usize>,
    tool_index: HashMap<u64, String>,
}

impl StreamState {
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn is_done(&self) -> bool {
        self.mode == StreamMode::Done
    }

    /// Tool calls accumulated so far, in first-seen order
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Merge a fragment into its accumulator and return the fragment as a
    /// partial call carrying the resolved id and name
    fn merge_tool_call(&mut self, delta: &ToolCallDelta) -> ToolCall {
        let id = self.resolve_tool_id(delta);

        let position = match self.positions.get(&id) {
            Some(position) => *position,
            None => {
                self.tool_calls.push(ToolCall {
                    id: id.clone(),
                    ..Default::default()
                });
                let position = self.tool_calls.len() - 1;
                self.positions.insert(id.clone(), position);
                position
            }
        };

        let entry = &mut self.tool_calls[position];
        if let Some(name) = delta.name.as_deref().filter(|name| !name.is_empty()) {
            entry.name = name.to_string();
        }
        if let Some(arguments) = &delta.arguments {
            entry.arguments = arguments.clone();
        }
        if let Some(fragment) = &delta.arguments_delta {
            entry.arguments.push_str(fragment);
        }

        ToolCall {
            id,
            name: entry.name.clone(),
            arguments: delta
                .arguments
                .clone()
                .or_else(|| delta.arguments_delta.clone())
                .unwrap_or_default(),
        }
    }

    fn resolve_tool_id(&mut self, delta: &ToolCallDelta) -> String {
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            if let Some(index) = delta.index {
                self.tool_index.insert(index, id.to_string());
            }
            return id.to_string();
        }

        if let Some(index) = delta.index {
            if let Some(id) = self.tool_index.get(&index) {
                return id.clone();
            }
            let id = format!("call_{}", index);
            self.tool_index.insert(index, id.clone());
            return id;
        }

        match self.tool_calls.last() {
            Some(last) => last.id.clone(),
            None => format!("call_{}", self.tool_calls.len()),
        }
    }

    /// Calls for the terminal chunk; partials still missing an id, a name or
    /// arguments are left out
    fn completed_tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls
            .iter()
            .filter(|call| call.is_complete())
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Routed {
    content: String,
    reasoning: String,
    reasoning_complete: bool,
}

impl Routed {
    fn push(&mut self, mode: StreamMode, text: &str) {
        match mode {
            StreamMode::Reasoning => self.reasoning.push_str(text),
            _ => self.content.push_str(text),
        }
    }
}

/// Turns a sequence of [`StreamDelta`]s into normalized chunks
#[derive(Debug, Clone)]
pub struct StreamNormalizer {
    detect_tags: bool,
    accept_native_reasoning: bool,
    state: StreamState,
}

impl StreamNormalizer {
    /// `detect_tags` enables reasoning-tag routing of content text;
    /// `accept_native_reasoning` forwards provider reasoning fields
    pub fn new(detect_tags: bool, accept_native_reasoning: bool) -> Self {
        Self {
            detect_tags,
            accept_native_reasoning,
            state: StreamState::default(),
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Normalize one delta; `None` once the stream has finished
    pub fn push(&mut self, delta: StreamDelta) -> Option<ChatStreamChunk> {
        if self.state.is_done() {
            trace!("Ignoring stream event after completion");
            return None;
        }

        let mut routed = Routed::default();

        let native = delta
            .native_reasoning
            .filter(|_| self.accept_native_reasoning);
        match native {
            Some(reasoning) => {
                self.flush_held(&mut routed);
                routed.reasoning.push_str(&reasoning);
                if let Some(content) = &delta.content {
                    routed.content.push_str(content);
                }
            }
            None => {
                if let Some(content) = &delta.content {
                    if self.detect_tags {
                        self.route_tagged(content, &mut routed);
                    } else {
                        routed.content.push_str(content);
                    }
                }
            }
        }

        let mut tool_calls: Vec<ToolCall> = delta
            .tool_calls
            .iter()
            .map(|fragment| self.state.merge_tool_call(fragment))
            .collect();

        let finish_reason = delta.finish_reason.filter(|reason| !reason.is_empty());
        let is_complete = finish_reason.is_some();
        if is_complete {
            self.flush_held(&mut routed);
            self.state.mode = StreamMode::Done;
            tool_calls = self.state.completed_tool_calls();
        }

        Some(ChatStreamChunk {
            content_delta: routed.content,
            reasoning_delta: non_empty(routed.reasoning),
            is_reasoning_complete: routed.reasoning_complete,
            is_complete,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            finish_reason,
            metadata: delta.metadata,
        })
    }

    /// Terminal chunk for a raw stream that ended without a finish reason
    pub fn finish(&mut self) -> Option<ChatStreamChunk> {
        if self.state.is_done() {
            return None;
        }

        let mut routed = Routed::default();
        self.flush_held(&mut routed);
        self.state.mode = StreamMode::Done;
        let tool_calls = self.state.completed_tool_calls();

        Some(ChatStreamChunk {
            content_delta: routed.content,
            reasoning_delta: non_empty(routed.reasoning),
            is_complete: true,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            ..Default::default()
        })
    }

    fn flush_held(&mut self, routed: &mut Routed) {
        if !self.state.held.is_empty() {
            let held = std::mem::take(&mut self.state.held);
            routed.push(self.state.mode, &held);
        }
    }

    fn route_tagged(&mut self, text: &str, routed: &mut Routed) {
        let mut pending = std::mem::take(&mut self.state.held);
        pending.push_str(text);

        loop {
            // ASCII lowercasing keeps byte offsets aligned with `pending`
            let lower = pending.to_ascii_lowercase();

            match self.state.mode {
                StreamMode::Reasoning => {
                    let tag = self.state.active_tag.unwrap_or(REASONING_TAGS[0]);
                    let closing = format!("</{}>", tag);
                    if let Some(pos) = lower.find(&closing) {
                        routed.reasoning.push_str(&pending[..pos]);
                        pending = pending[pos + closing.len()..].to_string();
                        self.state.mode = StreamMode::Normal;
                        self.state.active_tag = None;
                        routed.reasoning_complete = true;
                        continue;
                    }
                    let split = pending.len() - partial_tag_len(&lower, &[closing.as_str()]);
                    routed.reasoning.push_str(&pending[..split]);
                    self.state.held = pending[split..].to_string();
                    return;
                }
                _ => {
                    let opening = REASONING_TAGS
                        .iter()
                        .filter_map(|tag| {
                            lower
                                .find(&format!("<{}>", tag))
                                .map(|pos| (pos, *tag))
                        })
                        .min_by_key(|(pos, _)| *pos);

                    if let Some((pos, tag)) = opening {
                        routed.content.push_str(&pending[..pos]);
                        pending = pending[pos + tag.len() + 2..].to_string();
                        self.state.mode = StreamMode::Reasoning;
                        self.state.active_tag = Some(tag);
                        continue;
                    }

                    let openings: Vec<String> =
                        REASONING_TAGS.iter().map(|tag| format!("<{}>", tag)).collect();
                    let openings: Vec<&str> = openings.iter().map(String::as_str).collect();
                    let split = pending.len() - partial_tag_len(&lower, &openings);
                    routed.content.push_str(&pending[..split]);
                    self.state.held = pending[split..].to_string();
                    return;
                }
            }
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of a tag
fn partial_tag_len(text: &str, tags: &[&str]) -> usize {
    tags.iter()
        .map(|tag| {
            let max = (tag.len() - 1).min(text.len());
            (1..=max)
                .rev()
                .find(|&k| text.is_char_boundary(text.len() - k) && text.ends_with(&tag[..k]))
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}
