//! # aisemble-core
//!
//! Shared vocabulary for the AIsemble crates:
//!
//! - **Branded IDs**: `SessionId` and `MessageId` newtypes for type safety
//! - **Domain types**: `Role` and `ResourceType` closed enums, `TokenUsage`,
//!   `ToolCall`, `ToolInvocation`
//! - **Stream events**: `StreamEvent` for the provider streaming protocol
//! - **Agent catalog**: the static list of predefined personas
//! - **Text helpers**: session-title derivation

#![deny(unsafe_code)]

pub mod agents;
pub mod events;
pub mod ids;
pub mod text;
pub mod types;

pub use agents::{AGENTS, AgentDefinition, DEFAULT_AGENT_ID};
pub use events::{CompletedMessage, StreamEvent};
pub use ids::{MessageId, SessionId};
pub use text::generate_session_title;
pub use types::{
    ParseResourceTypeError, ParseRoleError, ResourceType, Role, TokenUsage, ToolCall,
    ToolInvocation, TranscriptSegment,
};
