//! Message repository — append-only chat transcript rows.
//!
//! `message_order` is assigned by the caller (the store facade computes
//! `MAX + 1` inside the same transaction as the insert) so the dense-order
//! invariant holds under concurrent appends.

use rusqlite::{Connection, params};

use aisemble_core::MessageId;

use crate::errors::Result;
use crate::rows::MessageRow;

/// Options for appending a message.
pub struct AppendMessageOptions<'a> {
    /// Owning session ID.
    pub session_id: &'a str,
    /// Author role ("user", "assistant", "system", "data").
    pub role: &'a str,
    /// Message text.
    pub content: &'a str,
    /// Total tokens for the turn.
    pub tokens_used: Option<i64>,
    /// Prompt-side tokens.
    pub prompt_tokens: Option<i64>,
    /// Completion-side tokens.
    pub content_tokens: Option<i64>,
    /// Tool invocations, pre-serialized as a JSON array string.
    pub tool_invocations: Option<&'a str>,
}

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Next free `message_order` slot for a session (0 when empty).
    ///
    /// Must be called inside the same transaction as the insert that uses it.
    pub fn next_order(conn: &Connection, session_id: &str) -> Result<i64> {
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(message_order) + 1, 0) FROM chat_messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Insert a message at the given order slot.
    pub fn insert(
        conn: &Connection,
        opts: &AppendMessageOptions<'_>,
        message_order: i64,
    ) -> Result<MessageRow> {
        let id = MessageId::new().into_inner();
        let now = chrono::Utc::now().to_rfc3339();

        let _ = conn.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, message_order,
             tokens_used, prompt_tokens, content_tokens, tool_invocations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                opts.session_id,
                opts.role,
                opts.content,
                message_order,
                opts.tokens_used,
                opts.prompt_tokens,
                opts.content_tokens,
                opts.tool_invocations,
                now,
            ],
        )?;

        Ok(MessageRow {
            id,
            session_id: opts.session_id.to_string(),
            role: opts.role.to_string(),
            content: opts.content.to_string(),
            message_order,
            tokens_used: opts.tokens_used,
            prompt_tokens: opts.prompt_tokens,
            content_tokens: opts.content_tokens,
            tool_invocations: opts.tool_invocations.map(String::from),
            created_at: now,
        })
    }

    /// List all messages for a session in conversation order.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM chat_messages WHERE session_id = ?1 ORDER BY message_order ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete all messages for a session, returning how many went away.
    pub fn delete_for_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM chat_messages WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            role: row.get("role")?,
            content: row.get("content")?,
            message_order: row.get("message_order")?,
            tokens_used: row.get("tokens_used")?,
            prompt_tokens: row.get("prompt_tokens")?,
            content_tokens: row.get("content_tokens")?,
            tool_invocations: row.get("tool_invocations")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
