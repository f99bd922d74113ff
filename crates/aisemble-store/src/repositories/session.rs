//! Session repository — chat session lifecycle and history listings.
//!
//! Sessions anchor a conversation to a resource (for now, a YouTube video)
//! and carry the display title shown in history lists.

use rusqlite::{Connection, OptionalExtension, params};

use aisemble_core::SessionId;

use crate::errors::Result;
use crate::rows::{SessionRow, SessionWithCount};

/// Options for creating a new session.
pub struct CreateSessionOptions<'a> {
    /// Resource the session is anchored to (e.g. a video ID).
    pub resource_id: &'a str,
    /// Resource kind discriminator.
    pub resource_type: &'a str,
    /// Display title.
    pub title: &'a str,
    /// Agent persona ID.
    pub agent_id: &'a str,
    /// Owning user ID.
    pub user_id: &'a str,
}

/// Options for listing sessions.
#[derive(Default)]
pub struct ListSessionsOptions<'a> {
    /// Resource the sessions are anchored to.
    pub resource_id: &'a str,
    /// Resource kind discriminator.
    pub resource_type: &'a str,
    /// Restrict to one user's sessions.
    pub user_id: Option<&'a str>,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Create a new session.
    pub fn create(conn: &Connection, opts: &CreateSessionOptions<'_>) -> Result<SessionRow> {
        let id = SessionId::new().into_inner();
        let now = chrono::Utc::now().to_rfc3339();

        let _ = conn.execute(
            "INSERT INTO chat_sessions (id, resource_id, resource_type, title, agent_id, user_id,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                opts.resource_id,
                opts.resource_type,
                opts.title,
                opts.agent_id,
                opts.user_id,
                now,
                now,
            ],
        )?;

        Ok(SessionRow {
            id,
            resource_id: opts.resource_id.to_string(),
            resource_type: opts.resource_type.to_string(),
            title: opts.title.to_string(),
            agent_id: opts.agent_id.to_string(),
            user_id: opts.user_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM chat_sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List sessions for a resource, most recently active first.
    ///
    /// Each row carries its message count so history lists don't need a
    /// second query per session.
    pub fn list_for_resource(
        conn: &Connection,
        opts: &ListSessionsOptions<'_>,
    ) -> Result<Vec<SessionWithCount>> {
        let mut sql = String::from(
            "SELECT s.*,
                    (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id) AS message_count
             FROM chat_sessions s
             WHERE s.resource_id = ?1 AND s.resource_type = ?2",
        );
        if opts.user_id.is_some() {
            sql.push_str(" AND s.user_id = ?3");
        }
        sql.push_str(" ORDER BY s.updated_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = match opts.user_id {
            Some(user_id) => stmt.query_map(
                params![opts.resource_id, opts.resource_type, user_id],
                Self::map_row_with_count,
            )?,
            None => stmt.query_map(
                params![opts.resource_id, opts.resource_type],
                Self::map_row_with_count,
            )?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update session title.
    pub fn update_title(conn: &Connection, session_id: &str, title: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Bump `updated_at` to now.
    pub fn touch(conn: &Connection, session_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Check if session exists.
    pub fn exists(conn: &Connection, session_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chat_sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Delete a session.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM chat_sessions WHERE id = ?1",
            params![session_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            resource_id: row.get("resource_id")?,
            resource_type: row.get("resource_type")?,
            title: row.get("title")?,
            agent_id: row.get("agent_id")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn map_row_with_count(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionWithCount> {
        Ok(SessionWithCount {
            session: Self::map_row(row)?,
            message_count: row.get("message_count")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
