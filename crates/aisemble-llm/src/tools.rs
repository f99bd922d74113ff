//! Tool definitions offered to the model.

use serde_json::json;

use crate::provider::ToolDefinition;

/// Name of the transcript-fetching tool.
pub const FETCH_TRANSCRIPT_TOOL: &str = "fetch_transcript";

/// The one tool the chat surface exposes: transcript retrieval by video ID.
#[must_use]
pub fn fetch_transcript_tool() -> ToolDefinition {
    ToolDefinition {
        name: FETCH_TRANSCRIPT_TOOL.into(),
        description: "Use this tool to fetch the transcript of a YouTube video".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "videoId": {
                    "type": "string",
                    "description": "The ID of the YouTube video to fetch the transcript for"
                }
            },
            "required": ["videoId"]
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
