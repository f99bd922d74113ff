//! # aisemble-settings
//!
//! Layered configuration for the AIsemble backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`Settings::default()`]
//! 2. **User file** — `~/.aisemble/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `AISEMBLE_*` overrides (highest priority)
//!
//! There is no global settings instance: the binary loads once at startup
//! and hands values to the services it constructs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::{
    AuthSettings, DatabaseSettings, LlmSettings, LogFormat, LoggingSettings, ServerSettings,
    Settings, YoutubeSettings,
};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
