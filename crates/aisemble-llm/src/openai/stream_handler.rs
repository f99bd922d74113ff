//! Chunk state machine for the chat-completions stream.
//!
//! Converts streamed [`ChatCompletionChunk`]s into [`StreamEvent`]s:
//! - `delta.content` → `TextDelta`
//! - `delta.tool_calls[].id/name` → `ToolCallStart`
//! - `delta.tool_calls[].function.arguments` → `ToolCallDelta`
//! - `finish_reason` → `ToolCallEnd` for every open call
//! - end of stream → `Done` with the aggregated message
//!
//! Chat-completions has no terminal event of its own (the `[DONE]` marker is
//! consumed by the SSE parser), so the provider calls [`finish_stream`] once
//! the line stream is exhausted.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use aisemble_core::{CompletedMessage, StreamEvent, TokenUsage, ToolCall};

use super::types::{ChatCompletionChunk, ToolCallChunk};

/// State accumulated across the chunks of one response.
#[derive(Clone, Debug)]
pub struct StreamState {
    /// Accumulated text content.
    pub accumulated_text: String,
    /// Tool calls keyed by wire index; `BTreeMap` keeps emission order stable.
    pub tool_calls: BTreeMap<u32, ToolCallState>,
    /// Usage totals from the final chunk.
    pub usage: Option<TokenUsage>,
    /// Finish reason from the last content chunk.
    pub finish_reason: Option<String>,
    /// Set when the backend put an error payload on the stream; suppresses `Done`.
    pub failed: bool,
}

/// One tool call being accumulated.
#[derive(Clone, Debug)]
pub struct ToolCallState {
    /// Call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Accumulated JSON arguments string.
    pub args: String,
    /// Whether `ToolCallEnd` was already emitted for this call.
    pub ended: bool,
}

/// Create a fresh stream state.
#[must_use]
pub fn create_stream_state() -> StreamState {
    StreamState {
        accumulated_text: String::new(),
        tool_calls: BTreeMap::new(),
        usage: None,
        finish_reason: None,
        failed: false,
    }
}

/// Process a single chunk and return corresponding [`StreamEvent`]s.
#[must_use]
pub fn process_chunk(chunk: &ChatCompletionChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(error) = &chunk.error {
        warn!(code = error.code.as_deref(), message = %error.message, "in-stream error from backend");
        state.failed = true;
        events.push(StreamEvent::Error {
            error: error.message.clone(),
        });
        return events;
    }

    if let Some(usage) = &chunk.usage {
        state.usage = Some(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });
    }

    for choice in &chunk.choices {
        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                state.accumulated_text.push_str(content);
                events.push(StreamEvent::TextDelta {
                    delta: content.clone(),
                });
            }
        }

        if let Some(fragments) = &choice.delta.tool_calls {
            for fragment in fragments {
                events.extend(process_tool_fragment(fragment, state));
            }
        }

        if let Some(reason) = &choice.finish_reason {
            state.finish_reason = Some(reason.clone());
            events.extend(end_open_tool_calls(state));
        }
    }

    events
}

/// Fold one tool-call fragment into the state.
fn process_tool_fragment(fragment: &ToolCallChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    let args_delta = fragment
        .function
        .as_ref()
        .and_then(|f| f.arguments.clone())
        .filter(|a| !a.is_empty());

    if let Some(tc) = state.tool_calls.get_mut(&fragment.index) {
        // Late id/name fill; some backends repeat them on later fragments.
        if let Some(id) = &fragment.id {
            if tc.id == format!("call_{}", fragment.index) {
                tc.id.clone_from(id);
            }
        }
        if tc.name.is_empty() {
            if let Some(name) = fragment.function.as_ref().and_then(|f| f.name.clone()) {
                tc.name = name;
            }
        }
        if let Some(delta) = args_delta {
            tc.args.push_str(&delta);
            events.push(StreamEvent::ToolCallDelta {
                tool_call_id: tc.id.clone(),
                arguments_delta: delta,
            });
        }
        return events;
    }

    let id = fragment
        .id
        .clone()
        .unwrap_or_else(|| format!("call_{}", fragment.index));
    let name = fragment
        .function
        .as_ref()
        .and_then(|f| f.name.clone())
        .unwrap_or_default();

    events.push(StreamEvent::ToolCallStart {
        tool_call_id: id.clone(),
        name: name.clone(),
    });

    let mut tc = ToolCallState {
        id: id.clone(),
        name,
        args: String::new(),
        ended: false,
    };
    if let Some(delta) = args_delta {
        tc.args.push_str(&delta);
        events.push(StreamEvent::ToolCallDelta {
            tool_call_id: id,
            arguments_delta: delta,
        });
    }
    let _ = state.tool_calls.insert(fragment.index, tc);

    events
}

/// Emit `ToolCallEnd` for every call that has not ended yet, in index order.
fn end_open_tool_calls(state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for tc in state.tool_calls.values_mut() {
        if tc.ended || tc.name.is_empty() {
            continue;
        }
        tc.ended = true;
        events.push(StreamEvent::ToolCallEnd {
            tool_call: ToolCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: parse_arguments(&tc.args, &tc.id, &tc.name),
            },
        });
    }
    events
}

/// Emit terminal events after the line stream is exhausted.
///
/// Ends any calls the backend never closed (no `finish_reason` arrived) and
/// builds the `Done` event. Returns nothing when an in-stream error already
/// terminated the response.
#[must_use]
pub fn finish_stream(state: &mut StreamState) -> Vec<StreamEvent> {
    if state.failed {
        return Vec::new();
    }

    let mut events = end_open_tool_calls(state);

    let tool_calls: Vec<ToolCall> = state
        .tool_calls
        .values()
        .filter(|tc| !tc.name.is_empty())
        .map(|tc| ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments: parse_arguments(&tc.args, &tc.id, &tc.name),
        })
        .collect();

    events.push(StreamEvent::Done {
        message: CompletedMessage {
            content: state.accumulated_text.clone(),
            tool_calls,
            token_usage: state.usage,
        },
        stop_reason: state
            .finish_reason
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    });

    events
}

/// Parse an accumulated arguments JSON string into a `Map`.
///
/// Fails open: malformed arguments become an empty map so the tool can still
/// run (and report its own error) instead of killing the stream.
fn parse_arguments(args: &str, tool_call_id: &str, tool_name: &str) -> Map<String, Value> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                tool_call_id,
                tool_name,
                parsed_type = other.to_string().chars().take(20).collect::<String>(),
                "tool call arguments parsed as non-object, dropping"
            );
            Map::new()
        }
        Err(e) => {
            warn!(
                tool_call_id,
                tool_name,
                error = %e,
                args_preview = %trimmed.chars().take(100).collect::<String>(),
                "failed to parse tool call arguments, returning empty object"
            );
            Map::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
