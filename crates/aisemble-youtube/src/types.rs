//! Wire types for the InnerTube `player` endpoint and `json3` caption
//! payloads, plus the public [`VideoDetails`] shape the rest of the system
//! consumes.
//!
//! InnerTube responses are large; these structs keep only the fields we
//! read and let `serde` drop the rest.

use aisemble_core::TranscriptSegment;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Player request
// ─────────────────────────────────────────────────────────────────────────────

/// Body of an InnerTube `player` call.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerRequest<'a> {
    pub video_id: &'a str,
    pub context: ClientContext<'a>,
}

/// InnerTube client context.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ClientContext<'a> {
    pub client: ClientInfo<'a>,
}

/// Client identification the endpoint keys its response shape on.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientInfo<'a> {
    pub client_name: &'a str,
    pub client_version: &'a str,
    pub hl: &'a str,
    pub gl: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Player response
// ─────────────────────────────────────────────────────────────────────────────

/// Subset of the InnerTube `player` response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    /// Core video metadata.
    pub video_details: Option<RawVideoDetails>,
    /// Caption track listing.
    pub captions: Option<Captions>,
    /// Secondary metadata (publish date lives here).
    pub microformat: Option<Microformat>,
}

/// `videoDetails` block of a player response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideoDetails {
    /// Video ID.
    #[serde(default)]
    pub video_id: String,
    /// Video title.
    #[serde(default)]
    pub title: String,
    /// Channel name.
    #[serde(default)]
    pub author: String,
    /// Duration in seconds, as a decimal string.
    #[serde(default)]
    pub length_seconds: String,
    /// View count, as a decimal string.
    #[serde(default)]
    pub view_count: String,
    /// Full description text.
    #[serde(default)]
    pub short_description: String,
    /// Thumbnail variants, smallest first.
    pub thumbnail: Option<ThumbnailSet>,
}

/// A set of thumbnail renditions.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ThumbnailSet {
    /// Renditions ordered smallest first.
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

/// One thumbnail rendition.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Thumbnail {
    /// Image URL.
    #[serde(default)]
    pub url: String,
    /// Width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Height in pixels.
    #[serde(default)]
    pub height: u32,
}

/// `captions` block of a player response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Captions {
    /// The tracklist renderer holding available caption tracks.
    pub player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

/// Caption tracklist.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracklistRenderer {
    /// Available caption tracks.
    #[serde(default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

/// One caption track.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    /// Timedtext URL; append `&fmt=json3` to get the JSON payload.
    #[serde(default)]
    pub base_url: String,
    /// BCP-47 language code (e.g. "en", "en-US").
    #[serde(default)]
    pub language_code: String,
    /// Track kind; "asr" marks auto-generated captions.
    pub kind: Option<String>,
}

/// `microformat` block of a player response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microformat {
    /// The renderer carrying publish metadata.
    pub player_microformat_renderer: Option<MicroformatRenderer>,
}

/// Publish metadata.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroformatRenderer {
    /// Publish date (ISO 8601 date or datetime).
    pub publish_date: Option<String>,
    /// Like count, as a decimal string. Absent on many videos.
    pub like_count: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// json3 captions
// ─────────────────────────────────────────────────────────────────────────────

/// A `fmt=json3` timedtext payload.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Json3Captions {
    /// Caption events in time order.
    #[serde(default)]
    pub events: Vec<CaptionEvent>,
}

/// One caption event. Events without `segs` are window updates and carry
/// no text.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CaptionEvent {
    /// Start offset in milliseconds.
    #[serde(default, rename = "tStartMs")]
    pub t_start_ms: u64,
    /// Text runs, concatenated in order.
    pub segs: Option<Vec<CaptionSeg>>,
}

/// One text run inside a caption event.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CaptionSeg {
    /// UTF-8 text of the run.
    pub utf8: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Video metadata shaped for API consumers.
///
/// Engagement counts are `None` when the platform does not report them;
/// the player endpoint never carries a comment count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Channel name.
    pub channel: String,
    /// Duration in seconds.
    pub length_seconds: u64,
    /// View count, when reported.
    pub views: Option<u64>,
    /// Like count, when reported.
    pub likes: Option<u64>,
    /// Comment count, when reported.
    pub comments: Option<u64>,
    /// Largest available thumbnail URL, if any.
    pub thumbnail_url: Option<String>,
    /// Publish date, if the platform returned one.
    pub published_at: Option<String>,
    /// Description text.
    pub description: String,
}

/// A transcript as fetched from the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchedTranscript {
    /// Video title from the player response, when present.
    pub title: Option<String>,
    /// Normalized segments. Empty when the video has no captions.
    pub segments: Vec<TranscriptSegment>,
}

impl VideoDetails {
    /// Shape a raw player response into the public form.
    pub(crate) fn from_player(video_id: &str, response: &PlayerResponse) -> Option<Self> {
        let raw = response.video_details.as_ref()?;
        let thumbnail_url = raw
            .thumbnail
            .as_ref()
            .and_then(|set| set.thumbnails.iter().max_by_key(|t| t.width * t.height))
            .map(|t| t.url.clone());
        let microformat = response
            .microformat
            .as_ref()
            .and_then(|m| m.player_microformat_renderer.as_ref());
        let published_at = microformat.and_then(|r| r.publish_date.clone());
        let likes = microformat
            .and_then(|r| r.like_count.as_ref())
            .and_then(|count| count.parse().ok());

        Some(Self {
            video_id: if raw.video_id.is_empty() {
                video_id.to_string()
            } else {
                raw.video_id.clone()
            },
            title: raw.title.clone(),
            channel: raw.author.clone(),
            length_seconds: raw.length_seconds.parse().unwrap_or(0),
            views: raw.view_count.parse().ok(),
            likes,
            // The player endpoint does not report comment counts.
            comments: None,
            thumbnail_url,
            published_at,
            description: raw.short_description.clone(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
