//! # aisemble-llm
//!
//! LLM provider abstraction and `OpenAI`-compatible streaming transport:
//!
//! - [`provider`] — the [`Provider`] trait, request types, and error taxonomy
//! - [`sse`] — byte-stream → SSE `data:` line parser
//! - [`openai`] — chat-completions provider ([`OpenAiProvider`])
//! - [`tools`] — tool definitions offered to the model

#![deny(unsafe_code)]

pub mod openai;
pub mod provider;
pub mod sse;
pub mod tools;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{
    ChatMessage, ChatRequest, EventStream, Provider, ProviderError, ProviderResult, ToolDefinition,
};
pub use tools::{FETCH_TRANSCRIPT_TOOL, fetch_transcript_tool};
