//! Runtime error types.

/// Errors that can occur while running a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// LLM provider error (transport, auth, rate limit, API).
    #[error("provider error: {0}")]
    Provider(#[from] aisemble_llm::ProviderError),

    /// Persistence error from the chat store.
    #[error("store error: {0}")]
    Store(#[from] aisemble_store::StoreError),

    /// Internal / unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the caller can reasonably retry the operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Store(_) | Self::Internal(_) => false,
        }
    }

    /// Error category string for logging and metrics labels.
    ///
    /// Provider errors keep their own taxonomy (`auth`, `rate_limit`,
    /// `network`, ...) so the turn-error counter separates upstream causes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.category(),
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience type alias for runtime results.
pub type Result<T> = std::result::Result<T, RuntimeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
