//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON file
//! format. Each type implements [`Default`] with production default values.
//! `#[serde(default)]` allows partial JSON — missing fields get their default
//! value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings for the AIsemble backend.
///
/// Loaded from `~/.aisemble/settings.json` (or a `--config` path) with
/// defaults applied for missing fields, then `AISEMBLE_*` environment
/// overrides. Example:
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "llm": { "model": "gpt-4o" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// HTTP server bind settings.
    pub server: ServerSettings,
    /// SQLite database settings.
    pub database: DatabaseSettings,
    /// Authentication settings.
    pub auth: AuthSettings,
    /// LLM provider settings.
    pub llm: LlmSettings,
    /// Video platform client settings.
    pub youtube: YoutubeSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// HTTP server bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// SQLite database settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file path; `None` means the binary's default
    /// (`~/.aisemble/aisemble.db`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Authentication settings.
///
/// The secret should normally come from `AISEMBLE_JWT_SECRET` rather than
/// the settings file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret for bearer tokens. Empty means unconfigured.
    pub jwt_secret: String,
}

/// LLM provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Chat-completions base URL; `None` means the provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key. Should normally come from `AISEMBLE_OPENAI_API_KEY`.
    pub api_key: String,
    /// Model ID.
    pub model: String,
    /// Max output tokens per response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Video platform client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YoutubeSettings {
    /// InnerTube base URL.
    pub base_url: String,
    /// Caption language preference (`hl`).
    pub lang: String,
    /// Region preference (`gl`).
    pub region: String,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            lang: "en".to_string(),
            region: "US".to_string(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default log level filter (overridden by `RUST_LOG` when set).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
