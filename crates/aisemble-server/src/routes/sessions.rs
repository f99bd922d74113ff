//! Chat session routes: create, list, fetch, rename, delete, and the
//! per-session message history.

use aisemble_core::{ResourceType, ToolInvocation};
use aisemble_runtime::NewChatSession;
use aisemble_store::{MessageRow, SessionRow, SessionWithCount};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::ApiError;
use crate::routes::normalize_video_id;
use crate::server::AppState;

/// Request body for `POST /api/chat-sessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    /// Video the session is anchored to.
    pub video_id: String,
    /// Optional explicit title; defaults to one derived from the video.
    pub title: Option<String>,
    /// Optional agent id; defaults to the YouTube researcher.
    pub agent_id: Option<String>,
}

/// Query string for `GET /api/chat-sessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    /// Video whose sessions to list.
    pub video_id: String,
}

/// Request body for `PATCH /api/chat-sessions/{id}`.
#[derive(Debug, Deserialize)]
pub struct RenameSessionBody {
    /// Replacement title.
    pub title: String,
}

/// `POST /api/chat-sessions` — create a session for the UI's new-chat action.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.auth.authenticate(&headers)?;
    let video_id = normalize_video_id(&body.video_id);

    let session = state
        .sessions
        .create_session(&NewChatSession {
            resource_id: &video_id,
            resource_type: ResourceType::Youtube,
            user_id: &user.id,
            title: body.title.as_deref(),
            agent_id: body.agent_id.as_deref(),
        })
        .map_err(ApiError::CreateSession)?;

    Ok(Json(json!({ "sessionId": session.id })))
}

/// `GET /api/chat-sessions?videoId=...` — the caller's sessions for a video,
/// newest activity first, each with its message count.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionWithCount>>, ApiError> {
    let user = state.auth.authenticate(&headers)?;
    let video_id = normalize_video_id(&query.video_id);

    let sessions = state
        .sessions
        .list_sessions(&video_id, ResourceType::Youtube, Some(&user.id))?;
    Ok(Json(sessions))
}

/// `GET /api/chat-sessions/{id}` — one session, or 404.
pub async fn get_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<SessionRow>, ApiError> {
    let _user = state.auth.authenticate(&headers)?;

    let session = state
        .sessions
        .get_session(&session_id)?
        .ok_or(ApiError::NotFound("Session"))?;
    Ok(Json(session))
}

/// `PATCH /api/chat-sessions/{id}` — rename a session.
pub async fn rename(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<RenameSessionBody>,
) -> Result<StatusCode, ApiError> {
    let _user = state.auth.authenticate(&headers)?;

    if state.sessions.rename_session(&session_id, &body.title)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Session"))
    }
}

/// `DELETE /api/chat-sessions/{id}` — delete a session and its messages.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let _user = state.auth.authenticate(&headers)?;

    if state.sessions.delete_session(&session_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Session"))
    }
}

/// One history message as served to clients: the stored row with the
/// `tool_invocations` JSON column parsed back into an array.
#[derive(Debug, Serialize)]
pub struct MessagePayload {
    /// Message ID.
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Author role.
    pub role: String,
    /// Message text.
    pub content: String,
    /// Position within the session.
    pub message_order: i64,
    /// Total tokens for the turn (assistant rows only).
    pub tokens_used: Option<i64>,
    /// Prompt-side tokens (assistant rows only).
    pub prompt_tokens: Option<i64>,
    /// Completion-side tokens (assistant rows only).
    pub content_tokens: Option<i64>,
    /// Tool invocations the turn ran, `null` when none.
    pub tool_invocations: Option<Vec<ToolInvocation>>,
    /// Creation timestamp.
    pub created_at: String,
}

impl TryFrom<MessageRow> for MessagePayload {
    type Error = serde_json::Error;

    fn try_from(row: MessageRow) -> Result<Self, serde_json::Error> {
        let tool_invocations = row.parsed_tool_invocations()?;
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            role: row.role,
            content: row.content,
            message_order: row.message_order,
            tokens_used: row.tokens_used,
            prompt_tokens: row.prompt_tokens,
            content_tokens: row.content_tokens,
            tool_invocations,
            created_at: row.created_at,
        })
    }
}

/// `GET /api/chat-sessions/{id}/messages` — message history in append order.
///
/// An unknown session id yields an empty list, matching the store.
pub async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessagePayload>>, ApiError> {
    let _user = state.auth.authenticate(&headers)?;

    let rows = state.store.list_messages(&session_id)?;
    let messages = rows
        .into_iter()
        .map(MessagePayload::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Internal(format!("stored tool_invocations failed to parse: {e}")))?;
    Ok(Json(messages))
}
