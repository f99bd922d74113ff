//! Chat-completions provider implementing the [`Provider`] trait.
//!
//! Builds and sends streaming requests to an `OpenAI`-compatible
//! `/chat/completions` endpoint. Authentication is a Bearer API key; usage
//! reporting is always requested via `stream_options`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, error, instrument, warn};

use aisemble_core::events::StreamEvent;

use crate::provider::{
    ChatMessage, ChatRequest, EventStream, Provider, ProviderError, ProviderResult, ToolDefinition,
};
use crate::sse::parse_sse_lines;

use super::stream_handler::{create_stream_state, finish_stream, process_chunk};
use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, DEFAULT_BASE_URL, OpenAiConfig, WireFunctionCall,
    WireFunctionDef, WireMessage, WireStreamOptions, WireTool, WireToolCall,
};

/// Streaming LLM provider for `OpenAI`-compatible chat-completions endpoints.
pub struct OpenAiProvider {
    /// Provider configuration.
    config: OpenAiConfig,
    /// HTTP client (reused across requests).
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Resolved base URL.
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Build HTTP headers for a chat-completions request.
    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", self.config.api_key);
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| ProviderError::Auth {
                message: format!("Invalid authorization header: {e}"),
            })?,
        );
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        Ok(headers)
    }

    /// Convert conversation messages to the wire format.
    fn convert_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|message| match message {
                ChatMessage::System { content } => WireMessage {
                    role: "system",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::User { content } => WireMessage {
                    role: "user",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => WireMessage {
                    role: "assistant",
                    content: if content.is_empty() {
                        None
                    } else {
                        Some(content.clone())
                    },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            tool_calls
                                .iter()
                                .map(|tc| WireToolCall {
                                    id: tc.id.clone(),
                                    call_type: "function",
                                    function: WireFunctionCall {
                                        name: tc.name.clone(),
                                        arguments: serde_json::to_string(&tc.arguments)
                                            .unwrap_or_else(|_| "{}".into()),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                },
                ChatMessage::ToolResult {
                    tool_call_id,
                    content,
                } => WireMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id.clone()),
                },
            })
            .collect()
    }

    /// Convert tool definitions to the wire format. Empty means no `tools` key.
    fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<WireTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| WireTool {
                    tool_type: "function",
                    function: WireFunctionDef {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        )
    }

    /// Build the full request body; request values win over config defaults.
    fn build_request(&self, request: &ChatRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(&request.messages),
            tools: Self::convert_tools(&request.tools),
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stream: true,
            stream_options: WireStreamOptions {
                include_usage: true,
            },
        }
    }

    /// Internal streaming implementation.
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream_internal(&self, request: &ChatRequest) -> ProviderResult<EventStream> {
        debug!(
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "starting chat-completions stream"
        );

        let headers = self.build_headers()?;
        let body = self.build_request(request);
        let url = format!("{}/chat/completions", self.base_url());

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            let (message, code, retryable) = parse_api_error(&body_text, status.as_u16());
            error!(status = status.as_u16(), ?code, %message, "chat-completions request failed");

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited {
                    retry_after_ms: retry_after_ms.unwrap_or(1_000),
                    message,
                });
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
                code,
                retryable,
            });
        }

        let byte_stream = response.bytes_stream();
        let sse_lines = parse_sse_lines(byte_stream);

        // The [DONE] marker is consumed by the SSE parser, so a trailing
        // sentinel marks end-of-stream for the state machine.
        let event_stream = sse_lines
            .map(Some)
            .chain(stream::once(std::future::ready(None)))
            .scan(create_stream_state(), |state, line| {
                let events = match line {
                    Some(line) => match serde_json::from_str::<ChatCompletionChunk>(&line) {
                        Ok(chunk) => process_chunk(&chunk, state),
                        Err(e) => {
                            warn!(line = %line, error = %e, "failed to parse stream chunk");
                            Vec::new()
                        }
                    },
                    None => finish_stream(state),
                };
                std::future::ready(Some(events))
            })
            .flat_map(stream::iter)
            .map(Ok);

        Ok(Box::pin(event_stream))
    }
}

/// Parse an API error response body.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>, bool) {
    let retryable = status == 429 || status >= 500;
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let message = error["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        let code = error["code"]
            .as_str()
            .or_else(|| error["type"].as_str())
            .map(String::from);
        (message, code, retryable)
    } else {
        (format!("HTTP {status}: {body}"), None, retryable)
    }
}

/// Parse a `retry-after` header value (delay-seconds form) into milliseconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1_000))
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream(&self, request: &ChatRequest) -> ProviderResult<EventStream> {
        let start_event = stream::once(async { Ok(StreamEvent::Start) });
        let inner_stream = self.stream_internal(request).await?;
        Ok(Box::pin(start_event.chain(inner_stream)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
