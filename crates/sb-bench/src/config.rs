//! Benchmark configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::BenchError;

/// Default number of push-only workers.
pub const PUSHER_THREADS_DEFAULT: usize = 2;

/// Default number of pop-only workers.
pub const POPPER_THREADS_DEFAULT: usize = 2;

/// Default measurement window (milliseconds).
pub const DURATION_MILLIS_DEFAULT: u64 = 500;

/// Default number of values pushed before the window opens.
pub const INITIAL_FILL_DEFAULT: usize = 10;

/// Maximum workers of either role (explicit limit).
pub const THREADS_MAX: usize = 256;

/// Maximum measurement window (milliseconds).
pub const DURATION_MILLIS_MAX: u64 = 600_000;

/// What the harness does with workers once the window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopPolicy {
    /// Raise the stop flag and detach; workers finish on their own time.
    Abandon,
    /// Raise the stop flag and wait for every worker to exit.
    Join,
}

/// Configuration for a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchConfig {
    /// Number of push-only workers
    pub pusher_threads: usize,
    /// Number of pop-only workers
    pub popper_threads: usize,
    /// Length of the measurement window
    pub duration_millis: u64,
    /// Values pushed before workers start
    pub initial_fill: usize,
    /// Seed for the value generators (random if unset)
    pub seed: Option<u64>,
    pub stop_policy: StopPolicy,
    /// Print a progress line from each worker as it starts
    pub progress: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            pusher_threads: PUSHER_THREADS_DEFAULT,
            popper_threads: POPPER_THREADS_DEFAULT,
            duration_millis: DURATION_MILLIS_DEFAULT,
            initial_fill: INITIAL_FILL_DEFAULT,
            seed: None,
            stop_policy: StopPolicy::Abandon,
            progress: true,
        }
    }
}

impl BenchConfig {
    /// Configuration for quick testing.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            duration_millis: 50,
            stop_policy: StopPolicy::Join,
            progress: false,
            ..Self::default()
        }
    }

    /// Configuration for stress testing.
    #[must_use]
    pub fn stress() -> Self {
        Self {
            pusher_threads: 8,
            popper_threads: 8,
            duration_millis: 2_000,
            initial_fill: 1_000,
            ..Self::default()
        }
    }

    /// The measurement window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_millis)
    }

    /// Total worker threads.
    #[must_use]
    pub fn workers_count(&self) -> usize {
        self.pusher_threads + self.popper_threads
    }

    /// Reject configurations that cannot produce a measurement.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.workers_count() == 0 {
            return Err(BenchError::InvalidConfig(
                "at least one pusher or popper thread is required".to_string(),
            ));
        }
        if self.pusher_threads > THREADS_MAX || self.popper_threads > THREADS_MAX {
            return Err(BenchError::InvalidConfig(format!(
                "at most {THREADS_MAX} threads per role (got {} pushers, {} poppers)",
                self.pusher_threads, self.popper_threads
            )));
        }
        if self.duration_millis == 0 || self.duration_millis > DURATION_MILLIS_MAX {
            return Err(BenchError::InvalidConfig(format!(
                "duration must be between 1 and {DURATION_MILLIS_MAX} ms (got {})",
                self.duration_millis
            )));
        }
        Ok(())
    }
}

/// Which stack implementation to benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackKind {
    LockFree,
    Locked,
    Deferred,
}

impl StackKind {
    /// Name used on the command line and in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StackKind::LockFree => "lock-free",
            StackKind::Locked => "locked",
            StackKind::Deferred => "deferred",
        }
    }

    /// Parse a command-line selection.
    ///
    /// `all` means the lock-free/locked comparison. The deferred stack
    /// keeps every popped node until drop, so it only runs on request.
    pub fn parse_selection(s: &str) -> Result<Vec<StackKind>, BenchError> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(vec![StackKind::LockFree, StackKind::Locked]);
        }
        s.split(',').map(|part| part.trim().parse()).collect()
    }
}

impl FromStr for StackKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lock-free" | "lockfree" | "treiber" => Ok(StackKind::LockFree),
            "locked" | "mutex" => Ok(StackKind::Locked),
            "deferred" => Ok(StackKind::Deferred),
            _ => Err(BenchError::UnknownStack(s.to_string())),
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
