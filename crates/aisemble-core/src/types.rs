//! Core domain types shared across the AIsemble crates.
//!
//! Roles and resource types are closed enums so exhaustive handling is
//! checked at compile time; both parse from and render to the lowercase
//! tags used in storage and on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
    /// System prompt material.
    System,
    /// Structured data attached to the conversation.
    Data,
}

/// Error returned when parsing an unknown role tag.
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl Role {
    /// The lowercase storage/wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Data => "data",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "data" => Ok(Self::Data),
            other => Err(ParseRoleError(other.to_owned())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceType
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of resource a chat session is scoped to.
///
/// Defaults to [`ResourceType::Youtube`], the only kind the current
/// surfaces create.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A YouTube video.
    #[default]
    Youtube,
    /// An uploaded document.
    Document,
    /// A web URL.
    Url,
    /// Raw pasted text.
    Text,
    /// A PDF file.
    Pdf,
}

/// Error returned when parsing an unknown resource-type tag.
#[derive(Debug, thiserror::Error)]
#[error("unknown resource type: {0}")]
pub struct ParseResourceTypeError(pub String);

impl ResourceType {
    /// The lowercase storage/wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Document => "document",
            Self::Url => "url",
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(Self::Youtube),
            "document" => Ok(Self::Document),
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            other => Err(ParseResourceTypeError(other.to_owned())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token usage
// ─────────────────────────────────────────────────────────────────────────────

/// Token accounting reported by the provider at stream completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens consumed by the prompt (system + history + user turn).
    pub prompt_tokens: u64,
    /// Tokens generated by the model.
    pub completion_tokens: u64,
    /// Prompt + completion.
    pub total_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript segments
// ─────────────────────────────────────────────────────────────────────────────

/// One normalized transcript segment as cached and fed to the model.
///
/// `timestamp` is the display form (`H:MM:SS`, hours unpadded) derived from
/// the platform's millisecond offset at fetch time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Caption text.
    pub text: String,
    /// Offset into the video, formatted `H:MM:SS`.
    pub timestamp: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool calls and invocations
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call emitted by the assistant during streaming.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique tool call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments (JSON object).
    pub arguments: Map<String, Value>,
}

/// A completed tool invocation attached to a persisted assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Tool name.
    pub tool_name: String,
    /// Arguments the model supplied.
    pub arguments: Map<String, Value>,
    /// Result fed back into the model's context.
    pub result: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_tag() {
        for role in [Role::User, Role::Assistant, Role::System, Role::Data] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn role_rejects_unknown_tag() {
        let err = Role::from_str("tool").unwrap_err();
        assert_eq!(err.0, "tool");
    }

    #[test]
    fn role_serde_is_lowercase() {
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
        let back: Role = serde_json::from_value(json!("data")).unwrap();
        assert_eq!(back, Role::Data);
    }

    #[test]
    fn resource_type_round_trips_through_tag() {
        for rt in [
            ResourceType::Youtube,
            ResourceType::Document,
            ResourceType::Url,
            ResourceType::Text,
            ResourceType::Pdf,
        ] {
            assert_eq!(ResourceType::from_str(rt.as_str()).unwrap(), rt);
        }
    }

    #[test]
    fn resource_type_rejects_unknown_tag() {
        assert!(ResourceType::from_str("spreadsheet").is_err());
    }

    #[test]
    fn token_usage_serde_is_camel_case() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 45,
            total_tokens: 165,
        };
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json["promptTokens"], 120);
        assert_eq!(json["completionTokens"], 45);
        assert_eq!(json["totalTokens"], 165);
    }

    #[test]
    fn tool_invocation_serde_shape() {
        let mut args = Map::new();
        let _ = args.insert("videoId".into(), json!("abc123"));
        let inv = ToolInvocation {
            tool_name: "fetch_transcript".into(),
            arguments: args,
            result: json!({"success": true}),
        };
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["toolName"], "fetch_transcript");
        assert_eq!(json["arguments"]["videoId"], "abc123");
        assert_eq!(json["result"]["success"], true);
    }
}
