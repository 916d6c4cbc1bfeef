//! End-to-end harness runs against every stack kind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sb_bench::{BenchConfig, BenchError, BenchHarness, StackKind, StopPolicy};
use sb_stacks::{ConcurrentStack, LockFreeStack};

const ALL_KINDS: [StackKind; 3] = [StackKind::LockFree, StackKind::Locked, StackKind::Deferred];

fn quick(seed: u64) -> BenchHarness {
    BenchHarness::new(BenchConfig {
        seed: Some(seed),
        ..BenchConfig::quick()
    })
    .unwrap()
}

#[test]
fn test_run_each_kind() {
    let harness = quick(7);
    for kind in ALL_KINDS {
        let report = harness.run_kind(kind).unwrap();
        assert_eq!(report.stack, kind.name());
        assert_eq!(report.prefill_operations, 10);
        assert!(report.window_operations > 0, "{} made no progress", kind);
        assert_eq!(report.operations, report.prefill_operations + report.window_operations);
        assert_eq!(report.workers_failed, 0);
        assert_eq!(report.seed, 7);
    }
}

#[test]
fn test_join_leaves_counter_stable() {
    let harness = quick(11);
    assert_eq!(harness.config().stop_policy, StopPolicy::Join);

    let stack = Arc::new(LockFreeStack::new());
    let report = harness.run(Arc::clone(&stack)).unwrap();

    // Every worker has exited, so nothing moves the counter any more.
    let settled = stack.operation_count();
    assert!(settled >= report.operations);
    std::thread::sleep(std::time::Duration::from_millis(10));
    assert_eq!(stack.operation_count(), settled);
}

#[test]
fn test_abandon_returns_after_window() {
    let harness = BenchHarness::new(BenchConfig {
        stop_policy: StopPolicy::Abandon,
        seed: Some(3),
        ..BenchConfig::quick()
    })
    .unwrap();

    let report = harness.run_kind(StackKind::Locked).unwrap();
    assert!(report.window_operations > 0);
    assert!(report.elapsed_millis >= report.duration_millis);
}

/// Panics on the first push issued by a worker.
struct FlakyStack {
    inner: LockFreeStack<i32>,
    pushes: AtomicU64,
    trip_at: u64,
}

impl ConcurrentStack<i32> for FlakyStack {
    fn push(&self, value: i32) {
        if self.pushes.fetch_add(1, Ordering::SeqCst) == self.trip_at {
            panic!("injected push failure");
        }
        self.inner.push(value);
    }

    fn pop(&self) -> Option<i32> {
        self.inner.pop()
    }

    fn operation_count(&self) -> u64 {
        self.inner.operation_count()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn name(&self) -> &'static str {
        "flaky"
    }

    fn snapshot(&self) -> Vec<i32> {
        self.inner.snapshot()
    }
}

#[test]
fn test_panicking_worker_is_isolated() {
    let harness = quick(5);
    let stack = Arc::new(FlakyStack {
        inner: LockFreeStack::new(),
        pushes: AtomicU64::new(0),
        trip_at: harness.config().initial_fill as u64,
    });

    let report = harness.run(Arc::clone(&stack)).unwrap();
    assert_eq!(report.workers_failed, 1);
    assert!(report.format().starts_with("[DEGRADED] flaky"));
    assert!(report.window_operations > 0);

    // The surviving workers left a stack that still drains cleanly.
    let before = stack.operation_count();
    let remaining = stack.inner.snapshot().len() as u64;
    let mut drained = 0;
    while stack.pop().is_some() {
        drained += 1;
    }
    assert_eq!(drained, remaining);
    assert!(stack.is_empty());
    assert_eq!(stack.operation_count(), before + remaining + 1);
}

#[test]
fn test_run_verified_each_kind() {
    let harness = quick(21);
    for kind in ALL_KINDS {
        let verified = harness.run_verified(kind).unwrap();
        assert_eq!(verified.report.stack, kind.name());
        assert!(verified
            .properties
            .iter()
            .any(|p| p == "NoLostElements"));
        assert!(!verified.properties.iter().any(|p| p == "LIFO_Order"));
    }
}

#[test]
fn test_compare_lock_free_and_locked() {
    let harness = quick(13);
    let kinds = StackKind::parse_selection("all").unwrap();
    let comparison = harness.compare(&kinds).unwrap();

    assert_eq!(comparison.reports.len(), 2);
    assert_eq!(comparison.reports[0].stack, "lock-free");
    assert_eq!(comparison.reports[1].stack, "locked");
    assert!(comparison.speedup.is_some_and(|s| s > 0.0));
    assert_eq!(comparison.summary_lines().len(), 3);
}

#[test]
fn test_compare_without_locked_has_no_speedup() {
    let harness = quick(17);
    let comparison = harness
        .compare(&[StackKind::LockFree, StackKind::Deferred])
        .unwrap();
    assert!(comparison.speedup.is_none());
}

#[test]
fn test_verified_report_json() {
    let harness = quick(42);
    let verified = harness.run_verified(StackKind::Locked).unwrap();
    let json = serde_json::to_value(&verified).unwrap();

    assert_eq!(json["report"]["stack"], "locked");
    assert_eq!(json["report"]["seed"], 42);
    assert!(json["properties"].as_array().is_some_and(|p| !p.is_empty()));
}

#[test]
fn test_invalid_selection() {
    assert!(matches!(
        StackKind::parse_selection("queue"),
        Err(BenchError::UnknownStack(_))
    ));
}
