//! `POST /api/youtube/chat` — the streaming chat turn.

use std::convert::Infallible;

use aisemble_runtime::{TurnEvent, TurnRequest};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tracing::error;

use crate::errors::ApiError;
use crate::routes::normalize_video_id;
use crate::server::AppState;

/// Run a chat turn and stream its events over SSE.
///
/// Authentication happens before the turn starts, so a rejected request
/// writes nothing. A client disconnect drops the stream, abandoning the
/// turn without persisting an assistant message; server shutdown cancels
/// it through the coordinator token.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<TurnRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user = state.auth.authenticate(&headers)?;
    request.video_id = normalize_video_id(&request.video_id);

    let cancel = state.shutdown.token().child_token();
    let turn = state.orchestrator.handle_turn(&user.id, request, cancel);
    let events = turn.map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Map a turn event onto a named SSE event with a JSON payload.
///
/// Tool start and finish share the `tool` event name; the payload's `type`
/// field distinguishes them.
fn sse_event(event: &TurnEvent) -> Event {
    let name = match event {
        TurnEvent::Text { .. } => "text",
        TurnEvent::ToolStarted { .. } | TurnEvent::ToolFinished { .. } => "tool",
        TurnEvent::Done { .. } => "done",
        TurnEvent::Error { .. } => "error",
    };
    match Event::default().event(name).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            error!(error = %e, "failed to encode stream event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"Stream encoding failed"}"#)
        }
    }
}
