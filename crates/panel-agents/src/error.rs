//! Panel error taxonomy with retry classification.
//!
//! Every error in the agent runtime is represented here. Callers can query
//! `is_retriable()` / `retry_category()` without string matching.
//!
//! ## Retry categories
//!
//! | Category      | Retriable |
//! |---------------|-----------|
//! | Transient     | yes       |
//! | RateLimit     | yes       |
//! | ParseFailure  | yes       |
//! | Exhausted     | no        |
//! | Configuration | no        |
//! | Fatal         | no        |

use std::fmt;

use thiserror::Error;

/// Classification used by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network / inference backend error.
    Transient,
    /// Provider rate limit.
    RateLimit,
    /// Model output did not match the requested schema.
    ParseFailure,
    /// The retry budget is already spent.
    Exhausted,
    /// Invalid or missing configuration.
    Configuration,
    /// Data, persistence or orchestration failure; retrying cannot help.
    Fatal,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimit | Self::ParseFailure)
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Configuration => write!(f, "configuration"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Unified error type for the panel runtime.
#[derive(Debug, Error)]
pub enum PanelError {
    // ── Retriable ─────────────────────────────────────────────────────────
    /// Rating capability request failed (network, timeout, backend error).
    #[error("Inference failure: {0}")]
    InferenceFailure(String),

    /// Provider rate limit.
    #[error("Rate limit: {0}")]
    RateLimit(String),

    /// Model output could not be parsed into the expected schema.
    #[error("Parse failure ({schema}): {reason}")]
    ParseFailure { schema: String, reason: String },

    // ── Non-retriable ─────────────────────────────────────────────────────
    /// The capability kept failing until the attempt budget ran out.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<PanelError>,
    },

    /// Configuration is invalid or missing required fields.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Corpus(#[from] coordination::CorpusError),

    #[error(transparent)]
    Persistence(#[from] coordination::debate::PersistenceError),

    #[error(transparent)]
    Transition(#[from] coordination::debate::TransitionError),

    /// The human intervention source failed (e.g. stdin closed with an error).
    #[error("Intervention source failed: {0}")]
    Intervention(String),

    /// Any other error that doesn't fit the above categories.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PanelError {
    /// Classify this error for retry logic.
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::InferenceFailure(_) => RetryCategory::Transient,
            Self::RateLimit(_) => RetryCategory::RateLimit,
            Self::ParseFailure { .. } => RetryCategory::ParseFailure,
            Self::RetriesExhausted { .. } => RetryCategory::Exhausted,
            Self::Configuration(_) => RetryCategory::Configuration,
            Self::Corpus(_)
            | Self::Persistence(_)
            | Self::Transition(_)
            | Self::Intervention(_)
            | Self::Internal(_) => RetryCategory::Fatal,
        }
    }

    /// Returns `true` if the retry loop may try again after this error.
    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }

    pub fn parse(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            schema: schema.into(),
            reason: reason.into(),
        }
    }
}

pub type PanelResult<T> = Result<T, PanelError>;
