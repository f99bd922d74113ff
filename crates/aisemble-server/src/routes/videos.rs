//! `GET /api/youtube/videos/{videoId}` — video metadata lookup.

use aisemble_youtube::VideoDetails;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;

use crate::errors::ApiError;
use crate::routes::normalize_video_id;
use crate::server::AppState;

/// Fetch details for one video from the platform.
pub async fn details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
) -> Result<Json<VideoDetails>, ApiError> {
    let _user = state.auth.authenticate(&headers)?;
    let video_id = normalize_video_id(&video_id);

    let details = state.platform.video_details(&video_id).await?;
    Ok(Json(details))
}
