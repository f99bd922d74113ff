//! LLM streaming events.
//!
//! [`StreamEvent`] is the in-memory protocol between a provider and the chat
//! orchestrator: text deltas, incremental tool-call construction, and a
//! terminal `done` carrying the aggregated message. Events are transient and
//! never persisted; the orchestrator reshapes them for the HTTP stream.

use serde::{Deserialize, Serialize};

use crate::types::{TokenUsage, ToolCall};

/// Events emitted while the model streams a response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Stream started.
    #[serde(rename = "start")]
    Start,

    /// Incremental text content.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Text fragment.
        delta: String,
    },

    /// Tool call started.
    #[serde(rename = "toolcall_start")]
    ToolCallStart {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
    },

    /// Incremental tool call argument JSON.
    #[serde(rename = "toolcall_delta")]
    ToolCallDelta {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Partial JSON arguments.
        #[serde(rename = "argumentsDelta")]
        arguments_delta: String,
    },

    /// Tool call fully constructed.
    #[serde(rename = "toolcall_end")]
    ToolCallEnd {
        /// Complete tool call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },

    /// Stream completed successfully.
    #[serde(rename = "done")]
    Done {
        /// Aggregated assistant message.
        message: CompletedMessage,
        /// Stop reason from the provider.
        #[serde(rename = "stopReason")]
        stop_reason: String,
    },

    /// Provider-reported error inside the stream.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        error: String,
    },
}

/// The aggregated result of one streamed model response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedMessage {
    /// Full assistant text (may be empty when the model only called tools).
    pub content: String,
    /// Tool calls requested by the model, in emission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, when the provider reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl CompletedMessage {
    /// Whether the response requested any tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
