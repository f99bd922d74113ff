//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape. The JSON columns
//! (`tool_invocations`, `transcript`) stay as strings here; the typed
//! accessors parse them on demand.

use aisemble_core::{ToolInvocation, TranscriptSegment};
use serde::{Deserialize, Serialize};

/// Raw session row from the `chat_sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID.
    pub id: String,
    /// Resource the session is anchored to (e.g. a video ID).
    pub resource_id: String,
    /// Resource kind discriminator.
    pub resource_type: String,
    /// Display title.
    pub title: String,
    /// Agent persona ID.
    pub agent_id: String,
    /// Owning user ID.
    pub user_id: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last activity timestamp.
    pub updated_at: String,
}

/// A session row joined with its message count, as returned by history
/// listings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionWithCount {
    /// The session row.
    #[serde(flatten)]
    pub session: SessionRow,
    /// Number of messages currently in the session.
    pub message_count: i64,
}

/// Raw message row from the `chat_messages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    /// Message ID.
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Author role ("user", "assistant", "system", "data").
    pub role: String,
    /// Message text.
    pub content: String,
    /// Position within the session, dense from 0.
    pub message_order: i64,
    /// Total tokens for the turn (assistant rows only).
    pub tokens_used: Option<i64>,
    /// Prompt-side tokens (assistant rows only).
    pub prompt_tokens: Option<i64>,
    /// Completion-side tokens (assistant rows only).
    pub content_tokens: Option<i64>,
    /// Tool invocations as a JSON array string, if any tools ran.
    pub tool_invocations: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

impl MessageRow {
    /// Parse the `tool_invocations` JSON column, if present.
    pub fn parsed_tool_invocations(
        &self,
    ) -> Result<Option<Vec<ToolInvocation>>, serde_json::Error> {
        self.tool_invocations
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}

/// Raw transcript row from the `transcripts` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptRow {
    /// Video ID (primary key).
    pub video_id: String,
    /// Segment array as a JSON string.
    pub transcript: String,
    /// Video title, when the platform returned one.
    pub title: Option<String>,
    /// User whose fetch populated the row.
    pub user_id: String,
    /// Creation timestamp.
    pub created_at: String,
}

impl TranscriptRow {
    /// Parse the `transcript` JSON column into segments.
    pub fn segments(&self) -> Result<Vec<TranscriptSegment>, serde_json::Error> {
        serde_json::from_str(&self.transcript)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
