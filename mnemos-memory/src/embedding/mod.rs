//! Embedding Provider Trait - Text to Vector
//!
//! `TigerStyle`: Simulation-first embedding generation.
//!
//! Embedding generation is an external capability. The memory engine only
//! sees this narrow interface; [`SimEmbeddingProvider`] is the deterministic
//! stand-in used by tests, benches and demos.

mod sim;

pub use sim::SimEmbeddingProvider;

use async_trait::async_trait;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from embedding providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Empty input provided
    #[error("empty input provided")]
    EmptyInput,

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Service unavailable
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason for unavailability
        message: String,
    },

    /// Dimension mismatch in returned embedding
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: usize,
        /// Actual dimensions received
        actual: usize,
    },

    /// Invalid request parameters
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what was invalid
        message: String,
    },
}

impl EmbeddingError {
    /// Create a service unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ServiceUnavailable { .. })
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate a unit-length embedding for one text.
    ///
    /// # Errors
    /// Returns `EmbeddingError` on empty input or provider failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for several texts, one per input.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the batch is empty, too large, or any
    /// text fails.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
