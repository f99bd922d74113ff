//! `OpenAI`-compatible chat-completions provider.
//!
//! - [`types`] — configuration and wire structures
//! - [`stream_handler`] — chunk state machine → [`StreamEvent`](aisemble_core::StreamEvent)s
//! - [`provider`] — `OpenAiProvider` implementing the `Provider` trait

pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::OpenAiProvider;
pub use types::{DEFAULT_BASE_URL, OpenAiConfig};
