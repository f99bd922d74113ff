//! Transcript repository — the per-video transcript cache.
//!
//! The cache is write-once per video: `INSERT OR IGNORE` keyed on the
//! primary key means the first writer wins and later writers are no-ops.
//! Rows are shared across users; `user_id` only records whose fetch
//! populated the row.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::rows::TranscriptRow;

/// Options for inserting a transcript.
pub struct InsertTranscriptOptions<'a> {
    /// Video ID (primary key).
    pub video_id: &'a str,
    /// Segment array, pre-serialized as a JSON string.
    pub transcript_json: &'a str,
    /// Video title, when the platform returned one.
    pub title: Option<&'a str>,
    /// User whose fetch populated the row.
    pub user_id: &'a str,
}

/// Transcript repository — stateless, every method takes `&Connection`.
pub struct TranscriptRepo;

impl TranscriptRepo {
    /// Insert a transcript if the video has none yet.
    ///
    /// Returns `true` if this call inserted the row, `false` if another
    /// writer got there first.
    pub fn insert_or_ignore(conn: &Connection, opts: &InsertTranscriptOptions<'_>) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO transcripts (video_id, transcript, title, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                opts.video_id,
                opts.transcript_json,
                opts.title,
                opts.user_id,
                now,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Get the cached transcript for a video.
    pub fn get(conn: &Connection, video_id: &str) -> Result<Option<TranscriptRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM transcripts WHERE video_id = ?1",
                params![video_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Check whether a video already has a cached transcript.
    pub fn exists(conn: &Connection, video_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transcripts WHERE video_id = ?1)",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Get the cached title for a video.
    ///
    /// Returns `None` both when the video has no row and when the row's
    /// title column is NULL; callers fall back to a placeholder either way.
    pub fn get_title(conn: &Connection, video_id: &str) -> Result<Option<String>> {
        let title: Option<Option<String>> = conn
            .query_row(
                "SELECT title FROM transcripts WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(title.flatten())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscriptRow> {
        Ok(TranscriptRow {
            video_id: row.get("video_id")?,
            transcript: row.get("transcript")?,
            title: row.get("title")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
