//! Recording wrapper for property verification.
//!
//! `TrackedStack` forwards every call to the wrapped stack and then records
//! the outcome under a mutex. The records are taken after the operation
//! returns, so with one thread the history is an exact sequential
//! execution; with several threads it is only an accounting of what
//! happened (check it with `StackPropertyChecker::concurrent`).
//!
//! The mutex serializes recording, not the stack operations themselves,
//! but it does add contention. Use it for verification runs, not for
//! throughput numbers.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sb_core::{StackHistory, StackProperties, ValueCounts};

use crate::stack::ConcurrentStack;

/// A stack wrapper that records pushes and pops.
pub struct TrackedStack<S, T> {
    inner: S,
    tracker: Mutex<StackTracker<T>>,
}

/// Tracking state for property verification.
struct StackTracker<T> {
    pushed: ValueCounts<T>,
    popped: ValueCounts<T>,
    empty_pops: u64,
    /// `None` when history recording is disabled
    history: Option<StackHistory<T>>,
    step: u64,
}

impl<S, T> TrackedStack<S, T>
where
    S: ConcurrentStack<T>,
    T: Eq + Hash + Clone,
{
    /// Wrap `inner`, recording the full operation history.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self::build(inner, Some(StackHistory::new()))
    }

    /// Wrap `inner` recording only value counts.
    ///
    /// Long concurrent runs produce millions of operations whose history
    /// cannot be checked for order anyway.
    #[must_use]
    pub fn without_history(inner: S) -> Self {
        Self::build(inner, None)
    }

    fn build(inner: S, history: Option<StackHistory<T>>) -> Self {
        debug_assert_eq!(
            inner.operation_count(),
            0,
            "Tracked stacks must start untouched"
        );
        Self {
            inner,
            tracker: Mutex::new(StackTracker {
                pushed: HashMap::new(),
                popped: HashMap::new(),
                empty_pops: 0,
                history,
                step: 0,
            }),
        }
    }

    /// The wrapped stack.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn tracker(&self) -> MutexGuard<'_, StackTracker<T>> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, T> ConcurrentStack<T> for TrackedStack<S, T>
where
    S: ConcurrentStack<T>,
    T: Eq + Hash + Clone + Send,
{
    fn push(&self, value: T) {
        let recorded = value.clone();
        self.inner.push(value);

        let mut tracker = self.tracker();
        *tracker.pushed.entry(recorded.clone()).or_default() += 1;
        tracker.step += 1;
        let step = tracker.step;
        if let Some(history) = tracker.history.as_mut() {
            history.record_push(recorded, step);
        }
    }

    fn pop(&self) -> Option<T> {
        let result = self.inner.pop();

        let mut tracker = self.tracker();
        match result {
            Some(ref value) => *tracker.popped.entry(value.clone()).or_default() += 1,
            None => tracker.empty_pops += 1,
        }
        tracker.step += 1;
        let step = tracker.step;
        if let Some(history) = tracker.history.as_mut() {
            history.record_pop(result.clone(), step);
        }

        result
    }

    fn operation_count(&self) -> u64 {
        self.inner.operation_count()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        self.inner.snapshot()
    }
}

impl<S, T> StackProperties<T> for TrackedStack<S, T>
where
    S: ConcurrentStack<T>,
    T: Eq + Hash + Copy,
{
    fn pushed_elements(&self) -> ValueCounts<T> {
        self.tracker().pushed.clone()
    }

    fn popped_elements(&self) -> ValueCounts<T> {
        self.tracker().popped.clone()
    }

    fn empty_pops(&self) -> u64 {
        self.tracker().empty_pops
    }

    fn current_contents(&self) -> Vec<T> {
        self.inner.snapshot()
    }

    fn history(&self) -> Option<StackHistory<T>> {
        self.tracker().history.clone()
    }

    fn operation_count(&self) -> u64 {
        self.inner.operation_count()
    }
}
