//! Background Maintenance
//!
//! `TigerStyle`: Periodic, isolated per agent, never propagates a failure
//! out of a tick.
//!
//! Every interval, for each agent the provider knows about:
//!
//! ```text
//! run_consolidation(agent) ──► cleanup(agent, retention_days)
//! ```
//!
//! One agent's failure is logged and counted; the remaining agents are
//! still processed. Shutdown waits for an in-flight pass to finish.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::consolidation::ConsolidationReport;
use crate::provider::TieredMemoryProvider;
use crate::storage::StorageBackend;

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Agents visited
    pub agents: usize,
    /// Agents where consolidation or cleanup failed
    pub failed_agents: usize,
    /// Combined rule-driven consolidation
    pub consolidation: ConsolidationReport,
    /// Records removed by retention cleanup
    pub archived: usize,
}

/// Periodic consolidation and archival over a provider.
pub struct MaintenanceScheduler<S: StorageBackend + ?Sized + 'static> {
    provider: Arc<TieredMemoryProvider<S>>,
    interval: Duration,
    retention_days: u32,
}

impl<S: StorageBackend + ?Sized + 'static> MaintenanceScheduler<S> {
    /// Scheduler using the provider's configured interval and retention.
    #[must_use]
    pub fn new(provider: Arc<TieredMemoryProvider<S>>) -> Self {
        let interval = provider.config().maintenance_interval();
        let retention_days = provider.config().retention_days;
        Self {
            provider,
            interval,
            retention_days,
        }
    }

    /// Override the interval.
    ///
    /// # Panics
    /// Panics if the interval is zero.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "maintenance interval must be positive");
        self.interval = interval;
        self
    }

    /// Override the retention window.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Run one pass over every known agent.
    pub async fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        for agent_id in self.provider.known_agents() {
            report.agents += 1;
            let mut failed = false;

            match self.provider.run_consolidation(&agent_id).await {
                Ok(consolidation) => report.consolidation.absorb(consolidation),
                Err(error) => {
                    tracing::warn!(%agent_id, %error, "maintenance consolidation failed");
                    failed = true;
                }
            }

            match self.provider.cleanup(&agent_id, self.retention_days).await {
                Ok(archived) => report.archived += archived,
                Err(error) => {
                    tracing::warn!(%agent_id, %error, "maintenance cleanup failed");
                    failed = true;
                }
            }

            if failed {
                report.failed_agents += 1;
            }
        }

        tracing::info!(
            agents = report.agents,
            consolidated = report.consolidation.consolidated,
            archived = report.archived,
            failed_agents = report.failed_agents,
            "maintenance pass complete"
        );
        report
    }

    /// Run passes every interval until shut down. The first pass happens one
    /// interval after spawning.
    #[must_use]
    pub fn spawn(self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut passes = 0_u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                        passes += 1;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(passes, "maintenance stopped");
            passes
        });

        MaintenanceHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a spawned maintenance loop.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl MaintenanceHandle {
    /// Stop the loop and wait for it. Returns the number of passes run.
    pub async fn shutdown(self) -> u64 {
        // A send error means the loop already exited
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(passes) => passes,
            Err(error) => {
                tracing::warn!(%error, "maintenance task ended abnormally");
                0
            }
        }
    }
}
