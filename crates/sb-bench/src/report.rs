//! Benchmark results.

use serde::Serialize;

/// Result of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    /// Name of the stack under test
    pub stack: String,
    /// Operation counter at the close of the window (prefill included)
    pub operations: u64,
    /// Operations performed by the prefill
    pub prefill_operations: u64,
    /// Operations completed by workers during the window
    pub window_operations: u64,
    /// Configured window length
    pub duration_millis: u64,
    /// Measured window length
    pub elapsed_millis: u64,
    pub ops_per_sec: f64,
    pub pushers: usize,
    pub poppers: usize,
    /// Workers that panicked before the window closed
    pub workers_failed: usize,
    /// Seed used for reproduction
    pub seed: u64,
}

impl BenchReport {
    /// The one-line result printed at the end of a run.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "The number of stack operations performed in {} ms for the {} stack --> {}",
            self.duration_millis, self.stack, self.operations
        )
    }

    /// Format for display.
    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.workers_failed == 0 {
            "OK"
        } else {
            "DEGRADED"
        };

        format!(
            "[{}] {} ops={} window_ops={} ops/s={:.0} pushers={} poppers={} failed={} seed={}",
            status,
            self.stack,
            self.operations,
            self.window_operations,
            self.ops_per_sec,
            self.pushers,
            self.poppers,
            self.workers_failed,
            self.seed
        )
    }
}

/// Several stacks run back to back under one configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub reports: Vec<BenchReport>,
    /// Lock-free window throughput divided by locked window throughput
    pub speedup: Option<f64>,
}

impl Comparison {
    /// Build a comparison, computing the speedup when both the lock-free
    /// and the locked stack were measured.
    #[must_use]
    pub fn new(reports: Vec<BenchReport>) -> Self {
        let rate = |name: &str| {
            reports
                .iter()
                .find(|r| r.stack == name)
                .map(|r| r.ops_per_sec)
        };

        let speedup = match (rate("lock-free"), rate("locked")) {
            (Some(lock_free), Some(locked)) if locked > 0.0 => Some(lock_free / locked),
            _ => None,
        };

        Self { reports, speedup }
    }

    /// Summary lines, one per stack, then the speedup if known.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.reports.iter().map(BenchReport::summary_line).collect();
        if let Some(speedup) = self.speedup {
            lines.push(format!(
                "Lock-free throughput relative to locked: {speedup:.2}x"
            ));
        }
        lines
    }
}
