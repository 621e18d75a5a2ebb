//! Clock - System and Simulated Time
//!
//! `TigerStyle`: Deterministic, controllable time for simulation.
//!
//! Every component that reads "now" (attention timestamps, record age,
//! recency boosts, retention sweeps) goes through [`Clock`], so tests can
//! drive time explicitly with a [`SimClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_DAY};

// =============================================================================
// SimClock
// =============================================================================

/// A simulated clock for deterministic testing.
///
/// `TigerStyle`:
/// - Time only moves forward
/// - All time operations are explicit
/// - No reliance on system time
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Current time in milliseconds since epoch (thread-safe)
    current_ms: Arc<AtomicI64>,
}

impl SimClock {
    /// Create a new clock starting at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::at_ms(0)
    }

    /// Create a clock starting at the given millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: i64) -> Self {
        Self {
            current_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Create a clock starting at the given `DateTime`.
    #[must_use]
    pub fn at_datetime(dt: DateTime<Utc>) -> Self {
        Self::at_ms(dt.timestamp_millis())
    }

    /// Get current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Get current time as `DateTime<Utc>`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms()).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Advance time by the given milliseconds.
    ///
    /// # Panics
    /// Panics if ms exceeds `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> i64 {
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({ms}) exceeds max ({DST_TIME_ADVANCE_MS_MAX})"
        );

        let delta = i64::try_from(ms).unwrap_or(i64::MAX);
        let old_time = self.current_ms.fetch_add(delta, Ordering::SeqCst);
        let new_time = old_time.saturating_add(delta);

        // Postcondition
        assert!(new_time >= old_time, "time must not go backwards");
        new_time
    }

    /// Advance time by whole days.
    pub fn advance_days(&self, days: u32) -> i64 {
        let ms = i64::from(days) * TIME_MS_PER_DAY;
        self.advance_ms(u64::try_from(ms).unwrap_or(0))
    }

    /// Advance time by a chrono Duration.
    pub fn advance(&self, duration: Duration) {
        debug_assert!(duration >= Duration::zero(), "cannot go back in time");
        self.advance_ms(u64::try_from(duration.num_milliseconds()).unwrap_or(0));
    }

    /// Set time to an absolute value.
    ///
    /// # Panics
    /// Panics if new time is less than current time.
    pub fn set_ms(&self, ms: i64) {
        let current = self.now_ms();
        assert!(ms >= current, "cannot set time backwards: {ms} < {current}");
        self.current_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Time source used by the memory engine.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Wall-clock time
    #[default]
    System,
    /// Simulated time under test control
    Sim(SimClock),
}

impl Clock {
    /// Current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Sim(clock) => clock.now(),
        }
    }

    /// Whether this clock is simulated.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Sim(_))
    }
}

impl From<SimClock> for Clock {
    fn from(clock: SimClock) -> Self {
        Self::Sim(clock)
    }
}
