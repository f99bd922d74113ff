//! API route handlers, grouped by resource.

pub mod agents;
pub mod chat;
pub mod sessions;
pub mod videos;

use aisemble_youtube::video_id_from_url;

/// Resolve a video reference to its bare ID.
///
/// Clients normally send the ID itself, but full watch, share, and shorts
/// URLs are accepted at every video-keyed route and reduced here so the
/// store and transcript cache only ever see bare IDs.
pub(crate) fn normalize_video_id(reference: &str) -> String {
    video_id_from_url(reference).unwrap_or_else(|| reference.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ids_pass_through() {
        assert_eq!(normalize_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn urls_reduce_to_the_id() {
        assert_eq!(
            normalize_video_id("https://youtu.be/dQw4w9WgXcQ?si=share"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_video_id("https://www.youtube.com/shorts/abc123XYZ_-"),
            "abc123XYZ_-"
        );
    }
}
