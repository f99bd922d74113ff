//! Video platform integration for aisemble.
//!
//! - URL parsing: extract a video ID from watch, share, and shorts URLs
//! - Metadata: fetch video details through the InnerTube `player` endpoint
//! - Transcripts: follow caption tracks and normalize `json3` payloads into
//!   timestamped segments
//!
//! A video without captions produces an empty transcript rather than an
//! error, so callers can cache the outcome either way.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod transcript;
pub mod types;
pub mod url;

pub use client::{DEFAULT_BASE_URL, INNERTUBE_API_KEY, InnerTubeClient, InnerTubeConfig};
pub use errors::{PlatformError, Result};
pub use transcript::{format_timestamp, segments_from_json3, select_caption_track};
pub use types::{CaptionTrack, FetchedTranscript, Json3Captions, PlayerResponse, VideoDetails};
pub use url::video_id_from_url;
