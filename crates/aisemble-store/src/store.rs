//! High-level transactional [`ChatStore`] API.
//!
//! Composes the repository operations into atomic, session-centric methods.
//! Every write method runs inside a single `SQLite` transaction — callers
//! never observe partial state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, instrument};

use aisemble_core::{ResourceType, Role, TokenUsage, ToolInvocation, TranscriptSegment};

use crate::connection::{self, DbConnection, DbPool, PoolConfig};
use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::repositories::message::{AppendMessageOptions, MessageRepo};
use crate::repositories::session::{CreateSessionOptions, ListSessionsOptions, SessionRepo};
use crate::repositories::transcript::{InsertTranscriptOptions, TranscriptRepo};
use crate::rows::{MessageRow, SessionRow, SessionWithCount, TranscriptRow};

/// Options for creating a new chat session.
pub struct NewSessionOptions<'a> {
    /// Resource the session is anchored to (e.g. a video ID).
    pub resource_id: &'a str,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Display title.
    pub title: &'a str,
    /// Agent persona ID.
    pub agent_id: &'a str,
    /// Owning user ID.
    pub user_id: &'a str,
}

/// Options for listing a resource's sessions.
#[derive(Default)]
pub struct SessionQuery<'a> {
    /// Resource the sessions are anchored to.
    pub resource_id: &'a str,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Restrict to one user's sessions.
    pub user_id: Option<&'a str>,
}

/// Options for appending a message to a session.
pub struct AppendMessage<'a> {
    /// Session to append to.
    pub session_id: &'a str,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: &'a str,
    /// Provider token accounting, for assistant turns.
    pub usage: Option<TokenUsage>,
    /// Tools that ran during the turn. Stored as NULL when empty.
    pub tool_invocations: Option<&'a [ToolInvocation]>,
}

/// Options for caching a transcript.
pub struct SaveTranscriptOptions<'a> {
    /// Video ID (cache key).
    pub video_id: &'a str,
    /// Normalized transcript segments.
    pub segments: &'a [TranscriptSegment],
    /// Video title, when the platform returned one.
    pub title: Option<&'a str>,
    /// User whose fetch populated the row.
    pub user_id: &'a str,
}

/// High-level chat store wrapping a connection pool and the repositories.
///
/// All write methods are transactional. Message appends are serialized
/// per-session via in-process mutex locks (`with_session_write_lock`);
/// `UNIQUE(session_id, message_order)` enforces the dense-order invariant
/// at the DB level even if a second process writes to the same file.
pub struct ChatStore {
    pool: DbPool,
    global_write_lock: Mutex<()>,
    session_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl ChatStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

    /// Create a new `ChatStore` with the given connection pool.
    ///
    /// The pool's schema must already be migrated; use [`ChatStore::open_file`]
    /// or [`ChatStore::open_in_memory`] to get both in one step.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            global_write_lock: Mutex::new(()),
            session_write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open a file-backed store and run pending migrations.
    pub fn open_file(path: &Path, config: &PoolConfig) -> Result<Self> {
        let pool = connection::open_file(path, config)?;
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self::new(pool))
    }

    /// Open an in-memory store and run migrations (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::open_in_memory(&PoolConfig::default())?;
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self::new(pool))
    }

    fn lock_global_write(&self) -> Result<MutexGuard<'_, ()>> {
        self.global_write_lock
            .lock()
            .map_err(|_| StoreError::Internal("global write lock poisoned".into()))
    }

    fn acquire_session_write_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| StoreError::Internal("session lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_session_write_lock<T>(
        &self,
        session_id: &str,
        f: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let session_lock = self.acquire_session_write_lock(session_id)?;
        let _guard = session_lock
            .lock()
            .map_err(|_| StoreError::Internal("session write lock poisoned".into()))?;
        self.retry_on_sqlite_busy(f)
    }

    fn with_global_write_lock<T>(&self, f: impl FnMut() -> Result<T>) -> Result<T> {
        let _guard = self.lock_global_write()?;
        self.retry_on_sqlite_busy(f)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff + jitter.
    ///
    /// Backoff: base = min(attempts * 10, 500) ms, jitter ±25% to prevent
    /// thundering herd when multiple writers contend on the same database.
    #[allow(clippy::unused_self)]
    fn retry_on_sqlite_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &StoreError) -> bool {
        match err {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => {
                matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
            }
            _ => false,
        }
    }

    fn remove_session_write_lock(&self, session_id: &str) -> Result<()> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| StoreError::Internal("session lock map poisoned".into()))?;
        let _ = locks.remove(session_id);
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new chat session.
    #[instrument(skip(self, opts), fields(resource_id = opts.resource_id, user_id = opts.user_id))]
    pub fn create_session(&self, opts: &NewSessionOptions<'_>) -> Result<SessionRow> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let session = SessionRepo::create(
                &conn,
                &CreateSessionOptions {
                    resource_id: opts.resource_id,
                    resource_type: opts.resource_type.as_str(),
                    title: opts.title,
                    agent_id: opts.agent_id,
                    user_id: opts.user_id,
                },
            )?;
            debug!(session_id = %session.id, "session created");
            Ok(session)
        })
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// List a resource's sessions, most recently active first, with message
    /// counts.
    pub fn list_sessions(&self, query: &SessionQuery<'_>) -> Result<Vec<SessionWithCount>> {
        let conn = self.conn()?;
        SessionRepo::list_for_resource(
            &conn,
            &ListSessionsOptions {
                resource_id: query.resource_id,
                resource_type: query.resource_type.as_str(),
                user_id: query.user_id,
            },
        )
    }

    /// Rename a session. Returns `false` if the session doesn't exist.
    #[instrument(skip(self, title))]
    pub fn rename_session(&self, session_id: &str, title: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_title(&conn, session_id, title)
        })
    }

    /// Bump a session's `updated_at`. Returns `false` if it doesn't exist.
    pub fn touch_session(&self, session_id: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::touch(&conn, session_id)
        })
    }

    /// Delete a session and all of its messages.
    ///
    /// Returns `false` if the session didn't exist. Deleting twice is a
    /// harmless no-op.
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let _ = MessageRepo::delete_for_session(&tx, session_id)?;
            let deleted = SessionRepo::delete(&tx, session_id)?;
            tx.commit()?;
            Ok(deleted)
        })?;

        if deleted {
            self.remove_session_write_lock(session_id)?;
            debug!(session_id, "session deleted");
        }
        Ok(deleted)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    /// Append a message to a session.
    ///
    /// Atomic: order assignment, insertion, and the session's `updated_at`
    /// bump happen in a single transaction, serialized per session.
    #[instrument(skip(self, opts), fields(session_id = opts.session_id, role = %opts.role))]
    pub fn append_message(&self, opts: &AppendMessage<'_>) -> Result<MessageRow> {
        // NULL when no tools ran, matching what history readers expect.
        let invocations_json = match opts.tool_invocations {
            Some(invocations) if !invocations.is_empty() => {
                Some(serde_json::to_string(invocations)?)
            }
            _ => None,
        };

        self.with_session_write_lock(opts.session_id, || {
            self.append_message_inner(opts, invocations_json.as_deref())
        })
    }

    /// Append a user message with no token accounting.
    pub fn append_user_message(&self, session_id: &str, content: &str) -> Result<MessageRow> {
        self.append_message(&AppendMessage {
            session_id,
            role: Role::User,
            content,
            usage: None,
            tool_invocations: None,
        })
    }

    /// Append an assistant message with usage and any tool invocations.
    pub fn append_assistant_message(
        &self,
        session_id: &str,
        content: &str,
        usage: Option<TokenUsage>,
        tool_invocations: Option<&[ToolInvocation]>,
    ) -> Result<MessageRow> {
        self.append_message(&AppendMessage {
            session_id,
            role: Role::Assistant,
            content,
            usage,
            tool_invocations,
        })
    }

    fn append_message_inner(
        &self,
        opts: &AppendMessage<'_>,
        invocations_json: Option<&str>,
    ) -> Result<MessageRow> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if !SessionRepo::exists(&tx, opts.session_id)? {
            return Err(StoreError::SessionNotFound(opts.session_id.to_string()));
        }

        let order = MessageRepo::next_order(&tx, opts.session_id)?;
        let row = MessageRepo::insert(
            &tx,
            &AppendMessageOptions {
                session_id: opts.session_id,
                role: opts.role.as_str(),
                content: opts.content,
                tokens_used: opts.usage.map(|u| clamp_i64(u.total_tokens)),
                prompt_tokens: opts.usage.map(|u| clamp_i64(u.prompt_tokens)),
                content_tokens: opts.usage.map(|u| clamp_i64(u.completion_tokens)),
                tool_invocations: invocations_json,
            },
            order,
        )?;
        let _ = SessionRepo::touch(&tx, opts.session_id)?;

        tx.commit()?;
        Ok(row)
    }

    /// List a session's messages in conversation order.
    ///
    /// A missing or deleted session reads as an empty list, not an error.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let conn = self.conn()?;
        MessageRepo::list_for_session(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transcript cache
    // ─────────────────────────────────────────────────────────────────────

    /// Get the cached transcript for a video, if any.
    pub fn get_transcript(&self, video_id: &str) -> Result<Option<TranscriptRow>> {
        let conn = self.conn()?;
        TranscriptRepo::get(&conn, video_id)
    }

    /// Check whether a video already has a cached transcript.
    pub fn has_transcript(&self, video_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        TranscriptRepo::exists(&conn, video_id)
    }

    /// Cache a transcript, first writer wins.
    ///
    /// Always returns the row that ended up in the cache — the caller's own
    /// segments when it won the race, the earlier writer's otherwise.
    #[instrument(skip(self, opts), fields(video_id = opts.video_id))]
    pub fn save_transcript(&self, opts: &SaveTranscriptOptions<'_>) -> Result<TranscriptRow> {
        let transcript_json = serde_json::to_string(opts.segments)?;

        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let inserted = TranscriptRepo::insert_or_ignore(
                &conn,
                &InsertTranscriptOptions {
                    video_id: opts.video_id,
                    transcript_json: &transcript_json,
                    title: opts.title,
                    user_id: opts.user_id,
                },
            )?;
            if inserted {
                debug!(video_id = opts.video_id, "transcript cached");
            }

            TranscriptRepo::get(&conn, opts.video_id)?.ok_or_else(|| {
                StoreError::Internal(format!(
                    "transcript row missing after insert: {}",
                    opts.video_id
                ))
            })
        })
    }

    /// Get the cached title for a video.
    pub fn video_title(&self, video_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        TranscriptRepo::get_title(&conn, video_id)
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
