//! Video ID extraction from the URL shapes users paste.

/// Extract a video ID from a watch, share, or shorts URL.
///
/// Handles `youtu.be/<id>`, `youtube.com/shorts/<id>`, and any URL carrying
/// a `v=` parameter. Returns `None` when no ID can be found; an ID is
/// whatever sits between the marker and the next delimiter, so callers get
/// back raw IDs unchanged only for well-formed links.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let id = if let Some(rest) = url.split_once("youtu.be/").map(|(_, rest)| rest) {
        rest.split(['?', '#']).next()
    } else if url.contains("youtube.com/shorts/") {
        url.split_once("shorts/")
            .map(|(_, rest)| rest)
            .and_then(|rest| rest.split(['?', '#']).next())
    } else if let Some(rest) = url.split_once("v=").map(|(_, rest)| rest) {
        rest.split(['&', '?', '#']).next()
    } else {
        None
    };

    match id {
        Some(id) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
