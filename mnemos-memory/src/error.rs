//! Memory Errors
//!
//! `TigerStyle`: One facade error, classified for the caller.
//!
//! Backend errors are split by what the caller can do about them:
//! malformed input is a `Validation` error and is never retried, transient
//! failures (connection, timeout, injected faults) are `BackendUnavailable`,
//! and anything else stays a `Storage` error.

use thiserror::Error;

use crate::agents::AgentError;
use crate::config::ConfigError;
use crate::embedding::EmbeddingError;
use crate::storage::StorageError;

/// Errors from the tiered memory provider.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// Malformed record, query or argument
    #[error("validation error: {message}")]
    Validation {
        /// What was wrong
        message: String,
    },

    /// Backend unreachable, timed out or faulted
    #[error("backend unavailable: {source}")]
    BackendUnavailable {
        /// Underlying backend error
        source: StorageError,
    },

    /// Embedding provider misbehaved in a way no fallback covers
    #[error("embedding failure: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A tier move failed
    #[error("consolidation of {memory_id} failed: {message}")]
    Consolidation {
        /// Memory being moved
        memory_id: String,
        /// Underlying failure
        message: String,
    },

    /// Other backend error
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl MemoryError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a consolidation error.
    #[must_use]
    pub fn consolidation(memory_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Consolidation {
            memory_id: memory_id.into(),
            message: message.to_string(),
        }
    }

    /// Whether this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BackendUnavailable { .. } => true,
            Self::Embedding(err) => err.is_retryable(),
            Self::Validation { .. } | Self::Consolidation { .. } | Self::Storage(_) => false,
        }
    }
}

impl From<StorageError> for MemoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation { message } => Self::Validation { message },
            err if err.is_transient() => Self::BackendUnavailable { source: err },
            err => Self::Storage(err),
        }
    }
}

impl From<AgentError> for MemoryError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::InvalidQuery { message } => Self::Validation { message },
            err @ AgentError::InvalidFeedback { .. } => Self::validation(err.to_string()),
            AgentError::Storage(err) => err.into(),
        }
    }
}

impl From<ConfigError> for MemoryError {
    fn from(err: ConfigError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        assert!(MemoryError::from(StorageError::validation("bad")).is_validation());
        assert!(matches!(
            MemoryError::from(StorageError::timeout(100)),
            MemoryError::BackendUnavailable { .. }
        ));
        assert!(matches!(
            MemoryError::from(StorageError::connection("refused")),
            MemoryError::BackendUnavailable { .. }
        ));
        assert!(matches!(
            MemoryError::from(StorageError::internal("bug")),
            MemoryError::Storage(_)
        ));
    }

    #[test]
    fn test_agent_error_conversion() {
        assert!(MemoryError::from(AgentError::invalid_query("empty")).is_validation());
        assert!(MemoryError::from(AgentError::InvalidFeedback { score: 1.5 }).is_validation());
        let err = MemoryError::from(AgentError::Storage(StorageError::simulated_fault("read")));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(MemoryError::from(EmbeddingError::Timeout).is_retryable());
        assert!(!MemoryError::from(EmbeddingError::dimension_mismatch(3, 4)).is_retryable());
        assert!(!MemoryError::validation("x").is_retryable());
        assert!(!MemoryError::consolidation("m1", "boom").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = MemoryError::consolidation("m1", "backend down");
        assert_eq!(err.to_string(), "consolidation of m1 failed: backend down");
    }
}
