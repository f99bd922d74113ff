//! Wire types for the chat-completions protocol.
//!
//! Request types serialize to the JSON body of
//! `POST {base_url}/chat/completions`; chunk types deserialize the SSE
//! `data:` payloads of the streamed response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default chat-completions base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the chat-completions provider.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL of the endpoint; [`DEFAULT_BASE_URL`] when `None`.
    pub base_url: Option<String>,
    /// API key sent as a Bearer token.
    pub api_key: String,
    /// Model ID (e.g. `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature applied when the request carries none.
    pub temperature: Option<f64>,
    /// Max output tokens applied when the request carries none.
    pub max_tokens: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming chat-completions request body.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    /// Model ID.
    pub model: String,
    /// Conversation, system message first.
    pub messages: Vec<WireMessage>,
    /// Function tools available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Always `true`; this provider only streams.
    pub stream: bool,
    /// Stream options; usage reporting is always requested.
    pub stream_options: WireStreamOptions,
}

/// The `stream_options` object of a streaming request.
#[derive(Debug, Serialize)]
pub struct WireStreamOptions {
    /// Ask for a final usage chunk after the last choice.
    pub include_usage: bool,
}

/// One message in the wire conversation.
#[derive(Debug, Serialize)]
pub struct WireMessage {
    /// `system`, `user`, `assistant`, or `tool`.
    pub role: &'static str,
    /// Text content; `None` for assistant turns that only called tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls made by a prior assistant turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    /// For `tool` messages, the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A completed tool call echoed back in an assistant message.
#[derive(Debug, Serialize)]
pub struct WireToolCall {
    /// Call ID.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: &'static str,
    /// Function name and arguments.
    pub function: WireFunctionCall,
}

/// The function part of a completed tool call.
#[derive(Debug, Serialize)]
pub struct WireFunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// A function tool declaration.
#[derive(Debug, Serialize)]
pub struct WireTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// The function schema.
    pub function: WireFunctionDef,
}

/// The function schema of a tool declaration.
#[derive(Debug, Serialize)]
pub struct WireFunctionDef {
    /// Tool name the model addresses it by.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response chunks
// ─────────────────────────────────────────────────────────────────────────────

/// One SSE data payload of the streamed response.
///
/// All fields are defaulted: the final usage chunk has no choices, and some
/// compatible backends put an `error` object on the stream instead of
/// aborting the connection.
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionChunk {
    /// Incremental choices; empty on the usage chunk.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage totals, present only on the final chunk.
    #[serde(default)]
    pub usage: Option<WireUsage>,
    /// In-stream error payload.
    #[serde(default)]
    pub error: Option<WireError>,
}

/// One choice of a chunk.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkChoice {
    /// Delta content for this chunk.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Why generation stopped; set on the last content chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The delta object of a chunk choice.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool-call fragments.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

/// One tool-call fragment inside a delta.
///
/// The first fragment for a call carries `index`, `id`, and the function
/// name; later fragments carry only `index` and an arguments piece.
#[derive(Debug, Deserialize)]
pub struct ToolCallChunk {
    /// Position of this call within the turn.
    pub index: u32,
    /// Call ID, on the first fragment.
    #[serde(default)]
    pub id: Option<String>,
    /// Function name/arguments fragment.
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

/// The function part of a tool-call fragment.
#[derive(Debug, Default, Deserialize)]
pub struct FunctionChunk {
    /// Tool name, on the first fragment.
    #[serde(default)]
    pub name: Option<String>,
    /// Piece of the JSON arguments string.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage totals reported on the final chunk.
#[derive(Debug, Deserialize)]
pub struct WireUsage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Prompt + completion.
    #[serde(default)]
    pub total_tokens: u64,
}

/// In-stream error payload.
#[derive(Debug, Deserialize)]
pub struct WireError {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Provider-specific error code.
    #[serde(default)]
    pub code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_expected_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                WireMessage {
                    role: "system",
                    content: Some("be helpful".into()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                WireMessage {
                    role: "user",
                    content: Some("hi".into()),
                    tool_calls: None,
                    tool_call_id: None,
                },
            ],
            tools: Some(vec![WireTool {
                tool_type: "function",
                function: WireFunctionDef {
                    name: "fetch_transcript".into(),
                    description: "fetch it".into(),
                    parameters: json!({"type": "object"}),
                },
            }]),
            temperature: Some(0.7),
            max_tokens: Some(2048),
            stream: true,
            stream_options: WireStreamOptions { include_usage: true },
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "fetch_transcript");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn request_omits_absent_optionals() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            tools: None,
            temperature: None,
            max_tokens: None,
            stream: true,
            stream_options: WireStreamOptions { include_usage: true },
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn tool_result_message_shape() {
        let msg = WireMessage {
            role: "tool",
            content: Some(r#"{"success":true}"#.into()),
            tool_calls: None,
            tool_call_id: Some("call_1".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn chunk_parses_text_delta() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices.len(), 1);
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn chunk_parses_tool_call_fragments() {
        let first: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"fetch_transcript","arguments":""}}]}}]}"#,
        )
        .unwrap();
        let calls = first.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, 0);
        assert_eq!(calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(
            calls[0].function.as_ref().unwrap().name.as_deref(),
            Some("fetch_transcript")
        );

        let followup: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"videoId\""}}]}}]}"#,
        )
        .unwrap();
        let calls = followup.choices[0].delta.tool_calls.as_ref().unwrap();
        assert!(calls[0].id.is_none());
        assert_eq!(
            calls[0].function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"videoId\"")
        );
    }

    #[test]
    fn chunk_parses_usage_only() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[],"usage":{"prompt_tokens":100,"completion_tokens":25,"total_tokens":125}}"#,
        )
        .unwrap();
        assert!(chunk.choices.is_empty());
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 25);
        assert_eq!(usage.total_tokens, 125);
    }

    #[test]
    fn chunk_parses_in_stream_error() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"error":{"message":"The server is overloaded","code":"overloaded"}}"#,
        )
        .unwrap();
        let error = chunk.error.unwrap();
        assert_eq!(error.message, "The server is overloaded");
        assert_eq!(error.code.as_deref(), Some("overloaded"));
    }

    #[test]
    fn chunk_tolerates_unknown_fields() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"x","object":"chat.completion.chunk","created":1,"model":"m","system_fingerprint":"fp","choices":[{"index":0,"delta":{},"logprobs":null,"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
