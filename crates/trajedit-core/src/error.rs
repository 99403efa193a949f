use thiserror::Error;

/// Failures the engine can report. None of them leave a half-edited document
/// behind: every operation validates before it mutates its private copy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unsupported document format: expected a top-level `history` array")]
    UnsupportedFormat,

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Step {step} is out of range (document has {steps} editable steps)")]
    OutOfRange { step: i64, steps: usize },

    #[error("Step {step} was modified since it was loaded; reload and try again")]
    StaleEdit { step: i64 },

    #[error("Search term not found: {pattern}")]
    NoMatch { pattern: String },

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl EngineError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }

    /// Stable machine-readable code for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            Self::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::StaleEdit { .. } => "STALE_EDIT",
            Self::NoMatch { .. } => "NO_MATCH",
            Self::InvalidPattern(_) => "INVALID_PATTERN",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
