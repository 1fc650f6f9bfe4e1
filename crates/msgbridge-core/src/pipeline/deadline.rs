//! Wall-clock budget checked at pipeline checkpoints.
//!
//! Time comes from a [`Clock`] so tests can control it. [`SystemClock`]
//! reads tokio's clock, which means a paused test runtime also pauses the
//! deadline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Abstraction over time for testability.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Returns the elapsed time since the given instant.
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }
}

/// Clock backed by `tokio::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct MockClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Creates a mock clock starting at the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Creates a mock clock that can be shared across threads.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock.
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

/// Points at which the elapsed time is compared against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Invocation entered.
    Started,
    /// Content fully read.
    Read,
    /// Structural checks passed.
    Validated,
    /// Document rendered.
    Converted,
    /// Document uploaded.
    Uploaded,
}

impl Stage {
    /// Lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Read => "read",
            Self::Validated => "validated",
            Self::Converted => "converted",
            Self::Uploaded => "uploaded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single budget established when an invocation starts.
pub struct Deadline {
    clock: Arc<dyn Clock>,
    started: Instant,
    budget: Duration,
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deadline")
            .field("started", &self.started)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl Deadline {
    /// Starts the budget now.
    #[must_use]
    pub fn start(clock: Arc<dyn Clock>, budget: Duration) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            budget,
        }
    }

    /// Time since the deadline was started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed(self.started)
    }

    /// Configured budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Fails with [`PipelineError::Timeout`] if the budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a timeout error naming `stage` once elapsed reaches the budget.
    pub fn check(&self, stage: Stage) -> Result<Duration, PipelineError> {
        let elapsed = self.elapsed();
        if elapsed >= self.budget {
            return Err(PipelineError::Timeout {
                stage,
                elapsed,
                budget: self.budget,
            });
        }
        Ok(elapsed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_within_budget() {
        let clock = MockClock::shared();
        let deadline = Deadline::start(clock.clone(), Duration::from_secs(30));
        clock.advance(Duration::from_secs(29));
        assert_eq!(deadline.check(Stage::Read).unwrap(), Duration::from_secs(29));
    }

    #[test]
    fn test_exhausted_budget() {
        let clock = MockClock::shared();
        let deadline = Deadline::start(clock.clone(), Duration::from_secs(30));
        clock.advance(Duration::from_secs(30));
        let err = deadline.check(Stage::Converted).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout { stage: Stage::Converted, elapsed, .. }
                if elapsed == Duration::from_secs(30)
        ));
    }

    #[test]
    fn test_zero_budget_fails_immediately() {
        let deadline = Deadline::start(MockClock::shared(), Duration::ZERO);
        assert!(deadline.check(Stage::Started).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_runtime() {
        let deadline = Deadline::start(Arc::new(SystemClock), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(deadline.check(Stage::Validated).is_err());
    }
}
