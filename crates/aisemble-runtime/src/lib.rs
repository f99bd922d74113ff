//! # aisemble-runtime
//!
//! Chat turn engine: the layer between the HTTP surface and the store,
//! provider, and platform clients.
//!
//! - **Orchestrator**: Runs one turn: session resolution → persist user
//!   message → model rounds with tool execution → persist assistant turn
//! - **Transcript cache**: Store-backed, fetch-once transcript retrieval
//!   with in-process coalescing
//! - **Session service**: Session lifecycle with generated titles and the
//!   default agent
//! - **Prompt**: The server-owned system prompt
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: aisemble-core, aisemble-llm,
//! aisemble-store, aisemble-youtube.
//! Depended on by: aisemble-server.

#![deny(unsafe_code)]

pub mod errors;
pub mod orchestrator;
pub mod prompt;
pub mod session_service;
pub mod transcript_cache;

// Re-export main public API
pub use errors::{Result, RuntimeError};
pub use orchestrator::{
    ChatOrchestrator, DEFAULT_MAX_TOOL_ROUNDS, TurnEvent, TurnMessage, TurnRequest, TurnStream,
};
pub use prompt::{FALLBACK_VIDEO_TITLE, system_prompt};
pub use session_service::{NewChatSession, SessionService, UNKNOWN_VIDEO_TITLE, VideoResource};
pub use transcript_cache::{TranscriptCache, TranscriptRecord};
