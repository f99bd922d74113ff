//! # aisemble-store
//!
//! `SQLite` persistence for chat sessions, messages, and the transcript cache.
//!
//! - **Connection pool**: `r2d2` + `rusqlite` with WAL mode and foreign keys
//! - **Migrations**: version-tracked SQL schema evolution
//! - **Repositories**: stateless structs, every method takes `&Connection`
//! - **[`ChatStore`]**: high-level transactional facade with per-session
//!   write locks and busy retry

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod rows;
pub mod store;

pub use connection::{DbConnection, DbPool, PoolConfig};
pub use errors::{Result, StoreError};
pub use rows::{MessageRow, SessionRow, SessionWithCount, TranscriptRow};
pub use store::{
    AppendMessage, ChatStore, NewSessionOptions, SaveTranscriptOptions, SessionQuery,
};
