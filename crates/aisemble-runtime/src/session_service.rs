//! Session lifecycle for resource-anchored chats.
//!
//! Thin policy layer over the store: it fills in generated titles and the
//! default agent, and shapes video resources for API consumers. No session
//! state lives here.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use aisemble_core::{DEFAULT_AGENT_ID, ResourceType};
use aisemble_store::{ChatStore, NewSessionOptions, SessionQuery, SessionRow, SessionWithCount};

use crate::errors::Result;

/// Title used when no transcript row has stored one for the video.
pub const UNKNOWN_VIDEO_TITLE: &str = "Unknown Video";

/// Parameters for creating a chat session.
#[derive(Clone, Copy, Debug)]
pub struct NewChatSession<'a> {
    /// Resource the session is anchored to (e.g. a video ID).
    pub resource_id: &'a str,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Owning user.
    pub user_id: &'a str,
    /// Explicit title; generated from the video title when absent.
    pub title: Option<&'a str>,
    /// Agent persona; the default agent when absent.
    pub agent_id: Option<&'a str>,
}

/// A video resource as the API reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoResource {
    /// Video ID.
    pub video_id: String,
    /// Best-known title.
    pub title: String,
    /// Whether a transcript row exists for the video.
    pub has_transcript: bool,
}

/// Session operations over the chat store.
pub struct SessionService {
    store: Arc<ChatStore>,
}

impl SessionService {
    /// Create a new service.
    pub fn new(store: Arc<ChatStore>) -> Self {
        Self { store }
    }

    /// Best-known title for a video: the stored transcript title, else a
    /// fixed placeholder. Lookup failures degrade to the placeholder.
    fn video_title(&self, video_id: &str) -> String {
        match self.store.video_title(video_id) {
            Ok(Some(title)) => title,
            Ok(None) => UNKNOWN_VIDEO_TITLE.to_owned(),
            Err(e) => {
                warn!(video_id, error = %e, "video title lookup failed");
                UNKNOWN_VIDEO_TITLE.to_owned()
            }
        }
    }

    /// Describe a video from the store's point of view.
    pub fn video_resource(&self, video_id: &str) -> Result<VideoResource> {
        let has_transcript = self.store.has_transcript(video_id)?;
        Ok(VideoResource {
            video_id: video_id.to_owned(),
            title: self.video_title(video_id),
            has_transcript,
        })
    }

    /// Create a session, filling in a generated title and the default agent
    /// where the caller left them out.
    #[instrument(skip_all, fields(resource_id = opts.resource_id, user_id = opts.user_id))]
    pub fn create_session(&self, opts: &NewChatSession<'_>) -> Result<SessionRow> {
        let title = match opts.title {
            Some(title) => title.to_owned(),
            None => format!("Chat: {}", self.video_resource(opts.resource_id)?.title),
        };
        let agent_id = opts.agent_id.unwrap_or(DEFAULT_AGENT_ID);

        let row = self.store.create_session(&NewSessionOptions {
            resource_id: opts.resource_id,
            resource_type: opts.resource_type,
            title: &title,
            agent_id,
            user_id: opts.user_id,
        })?;
        debug!(session_id = %row.id, title = %row.title, "created chat session");
        Ok(row)
    }

    /// Look up a session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        Ok(self.store.get_session(session_id)?)
    }

    /// List a resource's sessions, newest activity first, with message
    /// counts.
    pub fn list_sessions(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        user_id: Option<&str>,
    ) -> Result<Vec<SessionWithCount>> {
        Ok(self.store.list_sessions(&SessionQuery {
            resource_id,
            resource_type,
            user_id,
        })?)
    }

    /// Rename a session. Returns `false` if it doesn't exist.
    pub fn rename_session(&self, session_id: &str, title: &str) -> Result<bool> {
        Ok(self.store.rename_session(session_id, title)?)
    }

    /// Delete a session and its messages. Returns `false` if it didn't
    /// exist.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.store.delete_session(session_id)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
