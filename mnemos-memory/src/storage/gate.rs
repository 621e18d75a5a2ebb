//! `GatedBackend` - Bounded Concurrency and Latency
//!
//! `TigerStyle`: Every backend call is bounded twice: once waiting for a
//! permit, once running.
//!
//! A caller that cannot get a permit within the acquire timeout, or whose
//! call runs past the call timeout, gets `StorageError::Timeout`. A closed
//! semaphore is reported as a connection error. Both are transient.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::backend::{HealthStatus, StorageBackend, StorageStats};
use super::error::{StorageError, StorageResult};
use super::record::MemoryRecord;

/// Wraps a backend with a permit pool and per-call timeout.
#[derive(Debug)]
pub struct GatedBackend<S: StorageBackend + ?Sized> {
    inner: Arc<S>,
    permits: Arc<Semaphore>,
    permits_total: usize,
    acquire_timeout: Duration,
    call_timeout: Duration,
}

impl<S: StorageBackend + ?Sized> GatedBackend<S> {
    /// Gate `inner` with `permits` concurrent calls.
    ///
    /// # Panics
    /// Panics if `permits` is zero or either timeout is zero.
    #[must_use]
    pub fn new(
        inner: Arc<S>,
        permits: usize,
        acquire_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        assert!(permits > 0, "permits must be positive");
        assert!(!acquire_timeout.is_zero(), "acquire timeout must be positive");
        assert!(!call_timeout.is_zero(), "call timeout must be positive");

        Self {
            inner,
            permits: Arc::new(Semaphore::new(permits)),
            permits_total: permits,
            acquire_timeout,
            call_timeout,
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Permits not currently held.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one backend call under the gate.
    async fn gated<T, F>(&self, operation: &'static str, call: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>> + Send,
    {
        let permit = match tokio::time::timeout(self.acquire_timeout, self.permits.acquire()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(StorageError::connection(format!(
                    "backend gate closed during {operation}"
                )))
            }
            Err(_) => {
                tracing::warn!(
                    operation,
                    waited_ms = self.acquire_timeout.as_millis() as u64,
                    "backend permit wait timed out"
                );
                return Err(StorageError::timeout(self.acquire_timeout.as_millis() as u64));
            }
        };

        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "backend call timed out"
                );
                Err(StorageError::timeout(self.call_timeout.as_millis() as u64))
            }
        };
        drop(permit);
        result
    }
}

#[async_trait]
impl<S: StorageBackend + ?Sized> StorageBackend for GatedBackend<S> {
    async fn store(&self, agent_id: &str, record: &MemoryRecord) -> StorageResult<String> {
        self.gated("store", self.inner.store(agent_id, record)).await
    }

    async fn get(&self, agent_id: &str, id: &str) -> StorageResult<Option<MemoryRecord>> {
        self.gated("get", self.inner.get(agent_id, id)).await
    }

    async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>> {
        self.gated("retrieve", self.inner.retrieve(agent_id, query, limit))
            .await
    }

    async fn search(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>> {
        self.gated("search", self.inner.search(agent_id, embedding, limit))
            .await
    }

    async fn delete(&self, agent_id: &str, id: &str) -> StorageResult<bool> {
        self.gated("delete", self.inner.delete(agent_id, id)).await
    }

    async fn clear(&self, agent_id: &str) -> StorageResult<usize> {
        self.gated("clear", self.inner.clear(agent_id)).await
    }

    async fn get_stats(&self, agent_id: &str) -> StorageResult<StorageStats> {
        self.gated("stats", self.inner.get_stats(agent_id)).await
    }

    async fn cleanup(&self, agent_id: &str, retention_days: u32) -> StorageResult<usize> {
        self.gated("cleanup", self.inner.cleanup(agent_id, retention_days))
            .await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let status = self.gated("health", self.inner.health_check()).await?;
        Ok(status
            .with_detail("permits_available", self.available_permits())
            .with_detail("permits_total", self.permits_total))
    }
}
