//! Store-backed transcript cache with in-process fetch coalescing.
//!
//! A cache hit never touches the platform. A miss fetches once, persists,
//! and returns the stored row; simultaneous first requests for the same
//! video are serialized by a per-video-id async mutex, and the store's
//! INSERT OR IGNORE + re-read closes the race across processes. Platform
//! failures degrade to an empty transcript that is cached like any other.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use aisemble_core::TranscriptSegment;
use aisemble_store::{ChatStore, SaveTranscriptOptions, TranscriptRow};
use aisemble_youtube::{FetchedTranscript, InnerTubeClient};

use crate::errors::{Result, RuntimeError};

/// A cached transcript: the video's stored title and normalized segments.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptRecord {
    /// Video ID (cache key).
    pub video_id: String,
    /// Video title, when the platform returned one at fetch time.
    pub title: Option<String>,
    /// Normalized segments. Empty when the video has no captions or the
    /// fetch failed.
    pub segments: Vec<TranscriptSegment>,
}

/// Transcript cache over the chat store and the platform client.
pub struct TranscriptCache {
    store: Arc<ChatStore>,
    platform: Arc<InnerTubeClient>,
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TranscriptCache {
    /// Create a new cache.
    pub fn new(store: Arc<ChatStore>, platform: Arc<InnerTubeClient>) -> Self {
        Self {
            store,
            platform,
            fetch_locks: DashMap::new(),
        }
    }

    /// Get the transcript for a video, fetching and caching it on first use.
    ///
    /// The platform is called at most once per video in this process; every
    /// later call reads the stored row.
    #[instrument(skip_all, fields(video_id = %video_id))]
    pub async fn get_transcript(&self, video_id: &str, user_id: &str) -> Result<TranscriptRecord> {
        if let Some(row) = self.store.get_transcript(video_id)? {
            counter!("transcript_cache_hits_total").increment(1);
            debug!("transcript served from store");
            return record_from_row(&row);
        }

        let lock = self.fetch_lock(video_id);
        let _guard = lock.lock().await;

        // Another task may have fetched while we waited for the lock.
        if let Some(row) = self.store.get_transcript(video_id)? {
            counter!("transcript_cache_hits_total").increment(1);
            debug!("transcript cached while waiting for fetch lock");
            return record_from_row(&row);
        }

        counter!("transcript_cache_misses_total").increment(1);
        let fetched = match self.platform.fetch_transcript(video_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "transcript fetch failed, caching empty transcript");
                FetchedTranscript {
                    title: None,
                    segments: Vec::new(),
                }
            }
        };

        let row = self.store.save_transcript(&SaveTranscriptOptions {
            video_id,
            segments: &fetched.segments,
            title: fetched.title.as_deref(),
            user_id,
        })?;
        info!(segment_count = fetched.segments.len(), "transcript cached");

        // The row is durable now; later callers take the store fast path.
        let _ = self.fetch_locks.remove(video_id);

        record_from_row(&row)
    }

    /// Execute one transcript-fetch tool call and shape the JSON envelope
    /// fed back to the model.
    ///
    /// Success carries the segment list; failures map to fixed
    /// human-readable strings the system prompt teaches the model to
    /// explain.
    pub async fn tool_result(&self, video_id: &str, user_id: &str) -> Value {
        match self.get_transcript(video_id, user_id).await {
            Ok(record) => json!({ "success": true, "data": record.segments }),
            Err(RuntimeError::Store(e)) => {
                error!(video_id, error = %e, "transcript tool failed to persist");
                json!({ "success": false, "error": "Error saving transcripts" })
            }
            Err(e) => {
                error!(video_id, error = %e, "transcript tool failed");
                json!({
                    "success": false,
                    "error": "An error occurred while fetching the transcripts"
                })
            }
        }
    }

    fn fetch_lock(&self, video_id: &str) -> Arc<Mutex<()>> {
        self.fetch_locks
            .entry(video_id.to_owned())
            .or_default()
            .clone()
    }
}

fn record_from_row(row: &TranscriptRow) -> Result<TranscriptRecord> {
    let segments = row.segments().map_err(|e| {
        RuntimeError::Internal(format!(
            "cached transcript for {} is not valid JSON: {e}",
            row.video_id
        ))
    })?;
    Ok(TranscriptRecord {
        video_id: row.video_id.clone(),
        title: row.title.clone(),
        segments,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
