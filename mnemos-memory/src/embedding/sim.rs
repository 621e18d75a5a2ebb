//! Simulated Embedding Provider for Deterministic Testing
//!
//! `TigerStyle`: Deterministic, reproducible embeddings for DST.
//!
//! # Algorithm
//!
//! 1. Split the text into significant tokens
//! 2. Each token (hashed with the seed) seeds a `DeterministicRng` that
//!    produces a pseudo-random vector in [-1, 1]
//! 3. Token vectors are summed and normalized to unit length
//!
//! Texts sharing words therefore land close together under cosine
//! similarity, which keeps vector-search tests meaningful.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};
use crate::constants::{EMBEDDING_BATCH_SIZE_MAX, EMBEDDING_DIMENSIONS_COUNT};
use crate::dst::{DeterministicRng, FaultInjector, FaultType};
use crate::storage::significant_tokens;

// =============================================================================
// SimEmbeddingProvider
// =============================================================================

/// In-memory embedding provider for deterministic simulation testing.
#[derive(Clone, Debug)]
pub struct SimEmbeddingProvider {
    seed: u64,
    dimensions: usize,
    fault_injector: Option<Arc<FaultInjector>>,
}

impl SimEmbeddingProvider {
    /// Create a provider with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            dimensions: EMBEDDING_DIMENSIONS_COUNT,
            fault_injector: None,
        }
    }

    /// Create a provider sharing a simulation's fault injector.
    #[must_use]
    pub fn with_faults(seed: u64, fault_injector: Arc<FaultInjector>) -> Self {
        Self {
            fault_injector: Some(fault_injector),
            ..Self::new(seed)
        }
    }

    /// Override the dimensions.
    ///
    /// # Panics
    /// Panics if dimensions is zero.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");
        self.dimensions = dimensions;
        self
    }

    fn check_faults(&self) -> Result<(), EmbeddingError> {
        let Some(injector) = &self.fault_injector else {
            return Ok(());
        };
        match injector.should_inject_matching("embed", |fault| fault.is_embedding()) {
            Some(FaultType::EmbeddingTimeout) => Err(EmbeddingError::Timeout),
            Some(_) => Err(EmbeddingError::service_unavailable("simulated outage")),
            None => Ok(()),
        }
    }

    fn token_seed(&self, token: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut tokens = significant_tokens(text);
        if tokens.is_empty() {
            tokens.push(text.to_lowercase());
        }

        let mut embedding = vec![0.0_f64; self.dimensions];
        for token in &tokens {
            let mut rng = DeterministicRng::new(self.token_seed(token));
            for value in &mut embedding {
                *value += rng.next_float() * 2.0 - 1.0;
            }
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f64>().sqrt();
        #[allow(clippy::cast_possible_truncation)]
        let embedding: Vec<f32> = embedding
            .into_iter()
            .map(|x| if norm > 0.0 { (x / norm) as f32 } else { 0.0 })
            .collect();

        debug_assert_eq!(embedding.len(), self.dimensions);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for SimEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.check_faults()?;
        Ok(self.generate_embedding(text))
    }

    #[tracing::instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::invalid_request("batch cannot be empty"));
        }
        if texts.len() > EMBEDDING_BATCH_SIZE_MAX {
            return Err(EmbeddingError::invalid_request(format!(
                "batch of {} exceeds max {EMBEDDING_BATCH_SIZE_MAX}",
                texts.len()
            )));
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }
        self.check_faults()?;
        Ok(texts.iter().map(|text| self.generate_embedding(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}
