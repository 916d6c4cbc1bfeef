//! Throughput harness.
//!
//! A run pre-fills the stack, starts pusher and popper workers that loop
//! until a shared stop flag is raised, sleeps for the measurement window,
//! then reads the stack's operation counter. Workers are plain OS threads.
//! With `StopPolicy::Abandon` they are detached once the flag is raised and
//! nothing waits for them; every stack keeps its invariants however a
//! worker stops, so abandoning one mid-operation is safe.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use sb_core::{PropertyChecker, StackPropertyChecker};
use sb_stacks::{ConcurrentStack, DeferredStack, LockFreeStack, LockedStack, TrackedStack};

use crate::config::{BenchConfig, StackKind, StopPolicy};
use crate::error::BenchError;
use crate::report::{BenchReport, Comparison};

/// Role of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Pusher,
    Popper,
}

impl Role {
    fn progress_line(self, stack: &str) -> String {
        match self {
            Role::Pusher => format!("Pushing into {stack} stack..."),
            Role::Popper => format!("Popping from {stack} stack..."),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Pusher => f.write_str("pusher"),
            Role::Popper => f.write_str("popper"),
        }
    }
}

/// Counts a worker as failed if its thread unwinds.
struct WorkerGuard {
    role: Role,
    index: usize,
    failed: Arc<AtomicUsize>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.failed.fetch_add(1, Ordering::AcqRel);
            error!(role = %self.role, index = self.index, "worker panicked; remaining workers continue");
        }
    }
}

/// A benchmark run whose stack was checked afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedReport {
    pub report: BenchReport,
    /// Names of the properties that held
    pub properties: Vec<String>,
}

/// Benchmark harness for concurrent stacks.
#[derive(Debug, Clone)]
pub struct BenchHarness {
    config: BenchConfig,
}

impl BenchHarness {
    /// Create a harness, validating the configuration.
    pub fn new(config: BenchConfig) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    fn with_stop_policy(&self, stop_policy: StopPolicy) -> Self {
        Self {
            config: BenchConfig {
                stop_policy,
                ..self.config.clone()
            },
        }
    }

    /// Benchmark a fresh stack of the given kind.
    pub fn run_kind(&self, kind: StackKind) -> Result<BenchReport, BenchError> {
        match kind {
            StackKind::LockFree => self.run(Arc::new(LockFreeStack::new())),
            StackKind::Locked => self.run(Arc::new(LockedStack::new())),
            StackKind::Deferred => self.run(Arc::new(DeferredStack::new())),
        }
    }

    /// Benchmark each kind in turn.
    ///
    /// Workers of one run are joined before the next starts so runs do not
    /// compete for cores.
    pub fn compare(&self, kinds: &[StackKind]) -> Result<Comparison, BenchError> {
        let harness = self.with_stop_policy(StopPolicy::Join);
        let reports = kinds
            .iter()
            .map(|&kind| harness.run_kind(kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Comparison::new(reports))
    }

    /// Benchmark a tracked stack of the given kind, then check its
    /// invariants once every worker has exited.
    pub fn run_verified(&self, kind: StackKind) -> Result<VerifiedReport, BenchError> {
        let harness = self.with_stop_policy(StopPolicy::Join);
        match kind {
            StackKind::LockFree => harness.verify(LockFreeStack::new()),
            StackKind::Locked => harness.verify(LockedStack::new()),
            StackKind::Deferred => harness.verify(DeferredStack::new()),
        }
    }

    fn verify<S>(&self, inner: S) -> Result<VerifiedReport, BenchError>
    where
        S: ConcurrentStack<i32> + 'static,
    {
        debug_assert_eq!(self.config.stop_policy, StopPolicy::Join);

        let stack = Arc::new(TrackedStack::without_history(inner));
        let report = self.run(Arc::clone(&stack))?;

        let checker = StackPropertyChecker::new(&*stack)
            .concurrent()
            .with_seed(report.seed);
        let results = checker.check_all();

        let failures: Vec<String> = results
            .iter()
            .filter(|r| !r.holds)
            .map(ToString::to_string)
            .collect();
        if !failures.is_empty() {
            warn!(stack = %report.stack, failures = failures.len(), "verification failed");
            return Err(BenchError::VerificationFailed {
                stack: report.stack,
                failures: failures.join("\n"),
            });
        }

        info!(stack = %report.stack, properties = results.len(), "all properties hold");
        Ok(VerifiedReport {
            report,
            properties: results.into_iter().map(|r| r.name).collect(),
        })
    }

    /// Run the benchmark against `stack`.
    pub fn run<S>(&self, stack: Arc<S>) -> Result<BenchReport, BenchError>
    where
        S: ConcurrentStack<i32> + 'static,
    {
        let config = &self.config;
        let seed = config.seed.unwrap_or_else(rand::random);
        let name = stack.name();

        info!(
            stack = name,
            pushers = config.pusher_threads,
            poppers = config.popper_threads,
            duration_ms = config.duration_millis,
            initial_fill = config.initial_fill,
            seed,
            "starting benchmark"
        );

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..config.initial_fill {
            stack.push(rng.gen());
        }
        let prefill_operations = stack.operation_count();

        let stop = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicUsize::new(0));

        let roles = (0..config.pusher_threads)
            .map(|i| (Role::Pusher, i))
            .chain((0..config.popper_threads).map(|i| (Role::Popper, i)));

        let mut handles = Vec::with_capacity(config.workers_count());
        for (role, index) in roles {
            match self.spawn_worker(role, index, &stack, &stop, &failed, seed) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Release the workers already running.
                    stop.store(true, Ordering::Release);
                    error!(%role, index, error = %e, "failed to spawn worker");
                    return Err(e.into());
                }
            }
        }

        let start = Instant::now();
        thread::sleep(config.duration());
        let operations = stack.operation_count();
        let elapsed = start.elapsed();
        stop.store(true, Ordering::Release);

        match config.stop_policy {
            StopPolicy::Abandon => {
                debug!(workers = handles.len(), "abandoning workers");
                drop(handles);
            }
            StopPolicy::Join => {
                for handle in handles {
                    // A panicked worker was already counted by its guard.
                    let _ = handle.join();
                }
                debug!("all workers joined");
            }
        }

        let window_operations = operations.saturating_sub(prefill_operations);
        let elapsed_secs = elapsed.as_secs_f64();
        let ops_per_sec = if elapsed_secs > 0.0 {
            window_operations as f64 / elapsed_secs
        } else {
            0.0
        };

        let report = BenchReport {
            stack: name.to_string(),
            operations,
            prefill_operations,
            window_operations,
            duration_millis: config.duration_millis,
            elapsed_millis: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ops_per_sec,
            pushers: config.pusher_threads,
            poppers: config.popper_threads,
            workers_failed: failed.load(Ordering::Acquire),
            seed,
        };

        info!(stack = name, operations, ops_per_sec, workers_failed = report.workers_failed, "benchmark finished");
        Ok(report)
    }

    fn spawn_worker<S>(
        &self,
        role: Role,
        index: usize,
        stack: &Arc<S>,
        stop: &Arc<AtomicBool>,
        failed: &Arc<AtomicUsize>,
        seed: u64,
    ) -> std::io::Result<JoinHandle<()>>
    where
        S: ConcurrentStack<i32> + 'static,
    {
        let stack = Arc::clone(stack);
        let stop = Arc::clone(stop);
        let guard = WorkerGuard {
            role,
            index,
            failed: Arc::clone(failed),
        };
        let progress = self.config.progress;
        // Distinct from the prefill stream, which uses `seed` itself.
        let worker_seed = seed.wrapping_add(1 + index as u64);

        thread::Builder::new()
            .name(format!("{role}-{index}"))
            .spawn(move || {
                let _guard = guard;
                if progress {
                    println!("{}", role.progress_line(stack.name()));
                }
                debug!(%role, index, "worker started");

                match role {
                    Role::Pusher => {
                        let mut rng = StdRng::seed_from_u64(worker_seed);
                        while !stop.load(Ordering::Relaxed) {
                            stack.push(rng.gen());
                        }
                    }
                    Role::Popper => {
                        while !stop.load(Ordering::Relaxed) {
                            stack.pop();
                        }
                    }
                }

                debug!(%role, index, "worker stopped");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lines() {
        assert_eq!(
            Role::Pusher.progress_line("lock-free"),
            "Pushing into lock-free stack..."
        );
        assert_eq!(
            Role::Popper.progress_line("locked"),
            "Popping from locked stack..."
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = BenchConfig {
            duration_millis: 0,
            ..BenchConfig::quick()
        };
        assert!(matches!(
            BenchHarness::new(config),
            Err(BenchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_prefill_is_seeded() {
        let config = BenchConfig {
            pusher_threads: 1,
            popper_threads: 0,
            duration_millis: 5,
            initial_fill: 5,
            seed: Some(99),
            ..BenchConfig::quick()
        };
        let harness = BenchHarness::new(config).unwrap();
        let stack = Arc::new(LockedStack::new());

        let report = harness.run(Arc::clone(&stack)).unwrap();
        assert_eq!(report.seed, 99);
        assert_eq!(report.prefill_operations, 5);

        // With no poppers the prefill sits untouched at the bottom.
        let mut rng = StdRng::seed_from_u64(99);
        let mut expected: Vec<i32> = (0..5).map(|_| rng.gen()).collect();
        expected.reverse();
        let contents = stack.snapshot();
        assert_eq!(&contents[contents.len() - 5..], expected.as_slice());
    }
}
