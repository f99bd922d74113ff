//! API error type and its HTTP response mapping.
//!
//! Every failure leaving a handler renders as `{"error": message}` JSON.
//! Messages are fixed strings; upstream error text never reaches clients.

use aisemble_runtime::RuntimeError;
use aisemble_youtube::PlatformError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use crate::auth::AuthError;

/// Errors surfaced by API route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(#[source] AuthError),

    /// The named resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Session creation failed in the store.
    #[error("session creation failed: {0}")]
    CreateSession(#[source] RuntimeError),

    /// The video platform request failed.
    #[error("platform failure: {0}")]
    Platform(#[source] PlatformError),

    /// Anything else; details stay server-side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Platform(_) => StatusCode::BAD_GATEWAY,
            Self::CreateSession(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::CreateSession(_) => "Failed to create session".to_string(),
            Self::Platform(_) => "Failed to fetch video details".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err)
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<aisemble_store::StoreError> for ApiError {
    fn from(err: aisemble_store::StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        // A response that parsed but carried no video details means the
        // video does not exist (or is private), not that the platform is down.
        match err {
            PlatformError::Payload { .. } => Self::NotFound("Video"),
            other => Self::Platform(other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 10_000)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_renders_401() {
        let response = ApiError::Unauthorized(AuthError::MissingToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn not_found_renders_404() {
        let response = ApiError::NotFound("Session").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Session not found");
    }

    #[tokio::test]
    async fn create_session_failure_renders_fixed_message() {
        let err = ApiError::CreateSession(RuntimeError::Internal("disk full".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to create session");
    }

    #[tokio::test]
    async fn platform_failure_renders_502() {
        let err = ApiError::Platform(PlatformError::Api {
            status: 500,
            message: "upstream".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await["error"],
            "Failed to fetch video details"
        );
    }

    #[tokio::test]
    async fn internal_never_leaks_details() {
        let response = ApiError::Internal("connection pool exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn payload_error_becomes_video_not_found() {
        let err = ApiError::from(PlatformError::Payload {
            message: "no videoDetails".into(),
        });
        assert!(matches!(err, ApiError::NotFound("Video")));
    }

    #[test]
    fn api_error_stays_platform_failure() {
        let err = ApiError::from(PlatformError::Api {
            status: 429,
            message: "too many requests".into(),
        });
        assert!(matches!(err, ApiError::Platform(_)));
    }

    #[test]
    fn auth_error_converts_to_unauthorized() {
        let err = ApiError::from(AuthError::MissingToken);
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
