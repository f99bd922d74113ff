//! # aisemble-server
//!
//! Axum HTTP surface: REST session management and SSE chat streaming.
//!
//! - REST routes: agent catalog, session CRUD, message history, video details
//! - Chat route: one turn per request, streamed as named SSE events
//! - Bearer-token authentication (HS256 JWT) on every `/api` route except
//!   the agent catalog
//! - API errors rendered as `{"error": message}` JSON with fixed messages
//! - Prometheus metrics recorder and `/metrics` endpoint
//! - Graceful shutdown via `CancellationToken`
//!
//! ## Crate Position
//!
//! Outer surface. Depends on: aisemble-core, aisemble-runtime,
//! aisemble-store, aisemble-youtube.
//! Depended on by: aisemble-agent (the binary).

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;

// Re-export main public API
pub use auth::{AuthError, AuthUser, Authenticator};
pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{AisembleServer, AppState};
pub use shutdown::ShutdownCoordinator;
