//! The static catalog of predefined agents.
//!
//! Only the YouTube Researcher is wired to a pipeline today; the rest are
//! surfaced read-only so the client can render the picker.

use serde::Serialize;

/// Agent id bound to sessions when the caller does not supply one
/// (the YouTube Researcher).
pub const DEFAULT_AGENT_ID: &str = "bb15768a-f4fa-4c95-a0e3-2c7d327a1439";

/// A predefined agent persona.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    /// Catalog position, stable across releases.
    pub id: u32,
    /// Display title.
    pub title: &'static str,
    /// Title shown in the chat header.
    pub chat_title: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Label for the agent's input field.
    pub input_label: &'static str,
    /// Placeholder for the agent's input field.
    pub input_placeholder: &'static str,
    /// Whether the input is required before starting a chat.
    pub input_required: bool,
}

/// All predefined agents, in catalog order.
pub const AGENTS: &[AgentDefinition] = &[
    AgentDefinition {
        id: 1,
        title: "YouTube Researcher",
        chat_title: "YouTube Researcher",
        description: "A system agent that researches YouTube videos and provides a summary of the video.",
        input_label: "YouTube Researcher",
        input_placeholder: "Enter a YouTube video URL",
        input_required: true,
    },
    AgentDefinition {
        id: 2,
        title: "AI Interviewer",
        chat_title: "AI Interviewer",
        description: "A system agent that interviews a person and provides a feedback of the candidate.",
        input_label: "AI Interviewer",
        input_placeholder: "Enter a person's name",
        input_required: true,
    },
    AgentDefinition {
        id: 3,
        title: "AI Fitness Coach",
        chat_title: "AI Fitness Coach",
        description: "A system agent that provides a fitness plan based on the user's goals.",
        input_label: "AI Fitness Coach",
        input_placeholder: "Enter your fitness goals",
        input_required: true,
    },
    AgentDefinition {
        id: 4,
        title: "AI Sales Agent",
        chat_title: "AI Sales Agent",
        description: "A system agent that sells a product to a customer.",
        input_label: "AI Sales Agent",
        input_placeholder: "Enter the field of the product you want to sell",
        input_required: true,
    },
    AgentDefinition {
        id: 5,
        title: "X Researcher",
        chat_title: "AI X Researcher",
        description: "A system agent that will research a topic and provide a summary of the information.",
        input_label: "AI X Researcher",
        input_placeholder: "Enter a topic to research",
        input_required: true,
    },
];

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_five_agents_with_unique_ids() {
        assert_eq!(AGENTS.len(), 5);
        let mut ids: Vec<u32> = AGENTS.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn youtube_researcher_is_first() {
        assert_eq!(AGENTS[0].title, "YouTube Researcher");
        assert!(AGENTS[0].input_required);
    }

    #[test]
    fn default_agent_id_is_a_uuid() {
        assert!(uuid::Uuid::parse_str(DEFAULT_AGENT_ID).is_ok());
    }

    #[test]
    fn agent_serializes_camel_case() {
        let json = serde_json::to_value(AGENTS[0]).unwrap();
        assert_eq!(json["chatTitle"], "YouTube Researcher");
        assert_eq!(json["inputPlaceholder"], "Enter a YouTube video URL");
        assert_eq!(json["inputRequired"], true);
    }
}
