//! `GET /api/agents` — the static agent catalog.
//!
//! The catalog backs the client's agent picker and carries no secrets, so
//! this is the one API route served without authentication.

use aisemble_core::agents::{AGENTS, AgentDefinition};
use axum::Json;

/// List every available agent definition.
pub async fn list() -> Json<&'static [AgentDefinition]> {
    Json(AGENTS)
}
