//! # Provider Trait
//!
//! Core abstraction over the LLM backend. A provider turns a [`ChatRequest`]
//! into a boxed [`Stream`] of [`StreamEvent`]s, letting the runtime process
//! tokens incrementally regardless of the underlying wire format.

use std::pin::Pin;

use aisemble_core::events::StreamEvent;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed stream of [`StreamEvent`]s returned by [`Provider::stream`].
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE stream parsing failed.
    #[error("SSE parse error: {message}")]
    SseParse {
        /// Error description.
        message: String,
    },

    /// Authentication failed (invalid or unusable API key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::SseParse { .. }
            | Self::Auth { .. }
            | Self::Cancelled
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    /// Error category string for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::SseParse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request types
// ─────────────────────────────────────────────────────────────────────────────

/// One message in a provider conversation.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    /// Persona and behavior instructions.
    System {
        /// Instruction text.
        content: String,
    },
    /// A user turn.
    User {
        /// User text.
        content: String,
    },
    /// A prior assistant turn, with the tool calls it requested.
    Assistant {
        /// Assistant text (may be empty for tool-only turns).
        content: String,
        /// Tool calls the assistant made in this turn.
        tool_calls: Vec<aisemble_core::ToolCall>,
    },
    /// The result of one executed tool call, fed back to the model.
    ToolResult {
        /// ID of the tool call this answers.
        tool_call_id: String,
        /// Result payload as a JSON string.
        content: String,
    },
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Build an assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Build a tool-result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// A tool the model may call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    /// Tool name the model addresses it by.
    pub name: String,
    /// What the tool does, shown to the model.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

/// One streaming request to the provider.
///
/// The model is fixed by provider configuration; the request carries only
/// per-turn inputs.
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    /// Full conversation, system message first.
    pub messages: Vec<ChatMessage>,
    /// Tools available this turn. Empty means no tool use.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Core LLM provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. The
/// [`stream`](Provider::stream) method returns an async stream the caller
/// consumes until [`StreamEvent::Done`] or an error.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Current model ID (e.g. `"gpt-4o-mini"`).
    fn model(&self) -> &str;

    /// Stream a response from the LLM.
    async fn stream(&self, request: &ChatRequest) -> ProviderResult<EventStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
