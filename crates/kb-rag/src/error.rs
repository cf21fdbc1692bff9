//! Error types for the retrieval and routing engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Knowledge source call failed or timed out
    #[error("Retrieval from '{source_id}' failed: {message}")]
    TransientRetrieval { source_id: String, message: String },

    /// Answer generator call failed or timed out
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Router could not resolve any usable knowledge source
    #[error("No knowledge source targets available: {0}")]
    NoTargetsAvailable(String),

    /// Every fanned-out target failed
    #[error("All knowledge sources unavailable ({attempted} attempted)")]
    AllSourcesUnavailable { attempted: usize },

    /// Malformed correction payload
    #[error("Invalid correction: {0}")]
    CorrectionValidation(String),

    /// A correction-processing lease is already held for this pair
    #[error("Corrections for source '{source_id}' / company {company_id} are already being processed")]
    ConcurrentProcessing { source_id: String, company_id: i64 },

    /// Lifecycle status cannot move in the requested direction
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The enclosing request was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Correction store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a transient retrieval error
    pub fn retrieval(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientRetrieval {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a correction validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::CorrectionValidation(message.into())
    }

    /// Whether the failure is absorbed locally into a degraded result
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransientRetrieval { .. } | Error::Generation(_))
    }

    /// Stable tag for the boundary layer's retry/backoff policy
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TransientRetrieval { .. } => "transient_retrieval",
            Error::Generation(_) => "generation",
            Error::NoTargetsAvailable(_) => "no_targets_available",
            Error::AllSourcesUnavailable { .. } => "all_sources_unavailable",
            Error::CorrectionValidation(_) => "correction_validation",
            Error::ConcurrentProcessing { .. } => "concurrent_processing",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::NotFound(_) => "not_found",
            Error::Cancelled => "cancelled",
            Error::Config(_) => "config_error",
            Error::Storage(_) => "storage_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::retrieval("kb-1", "timeout").is_recoverable());
        assert!(Error::generation("throttled").is_recoverable());
        assert!(!Error::AllSourcesUnavailable { attempted: 2 }.is_recoverable());
        assert!(!Error::NoTargetsAvailable("empty".into()).is_recoverable());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::Cancelled.kind(), "cancelled");
        assert_eq!(
            Error::ConcurrentProcessing {
                source_id: "kb".into(),
                company_id: 1
            }
            .kind(),
            "concurrent_processing"
        );
    }
}
