//! Caption track selection and `json3` normalization.
//!
//! The platform returns captions as timed events with text runs. We flatten
//! each event into one [`TranscriptSegment`] with a human-readable
//! `H:MM:SS` timestamp, dropping window updates and whitespace-only runs.

use aisemble_core::TranscriptSegment;

use crate::types::{CaptionTrack, Json3Captions};

/// Render a millisecond offset as `H:MM:SS` (hours unpadded).
#[must_use]
pub fn format_timestamp(start_ms: u64) -> String {
    let total_seconds = start_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

/// Pick the caption track to fetch.
///
/// Prefers a manually-authored English track, then any English track, then
/// the first track of any language. Returns `None` when the list is empty.
#[must_use]
pub fn select_caption_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    let is_english = |track: &&CaptionTrack| track.language_code.starts_with("en");
    let is_manual = |track: &&CaptionTrack| track.kind.as_deref() != Some("asr");

    tracks
        .iter()
        .find(|t| is_english(t) && is_manual(t))
        .or_else(|| tracks.iter().find(is_english))
        .or_else(|| tracks.first())
}

/// Flatten a `json3` payload into normalized segments.
///
/// Each event's text runs are concatenated, newlines collapsed to spaces,
/// and the result trimmed. Events without text are skipped.
#[must_use]
pub fn segments_from_json3(captions: &Json3Captions) -> Vec<TranscriptSegment> {
    captions
        .events
        .iter()
        .filter_map(|event| {
            let segs = event.segs.as_ref()?;
            let text: String = segs
                .iter()
                .filter_map(|seg| seg.utf8.as_deref())
                .collect::<String>()
                .replace('\n', " ")
                .trim()
                .to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                text,
                timestamp: format_timestamp(event.t_start_ms),
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
