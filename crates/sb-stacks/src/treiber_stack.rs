//! Treiber Stack - Lock-free stack implementation.
//!
//! # Invariants
//!
//! | Property | Verified By |
//! |----------|-------------|
//! | NoLostElements | property checker, concurrent tests |
//! | NoDuplicates | property checker, concurrent tests |
//! | CounterExact | property checker |
//! | LIFO_Order | property checker, proptest |
//! | ABA_Safety | epoch GC |
//!
//! # Memory Safety
//!
//! Uses epoch-based garbage collection from crossbeam-epoch. A popped node
//! is handed to `defer_destroy` and freed only after every thread pinned at
//! the time of the pop has unpinned, so a stale `head` read by a concurrent
//! pop can still be dereferenced and its address cannot be recycled into a
//! new node while that pop's CAS is pending (no ABA).

use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::Backoff;

use crate::stack::ConcurrentStack;

/// A lock-free Treiber stack.
///
/// This is the classic lock-free stack design by R. Kent Treiber (1986).
/// Operations are linearizable and lock-free (at least one thread makes
/// progress in any execution).
pub struct LockFreeStack<T> {
    /// Pointer to top node
    head: Atomic<Node<T>>,
    /// Completed push/pop calls
    operations: AtomicU64,
}

/// Node in the stack.
///
/// The value is moved out by the winning pop, so the node itself must not
/// drop it when the collector frees the memory.
struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

impl<T> LockFreeStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
            operations: AtomicU64::new(0),
        }
    }

    /// Push a value onto the stack.
    ///
    /// This operation is lock-free: it will complete in bounded time
    /// unless preempted infinitely.
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });

        let guard = epoch::pin();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);

            // The node is still private, so relinking it on every attempt
            // has no visible effect.
            node.next.store(head, Ordering::Relaxed);

            match self.head.compare_exchange(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
                &guard,
            ) {
                Ok(_) => break,
                Err(e) => {
                    // Lost the race; take the node back and retry.
                    node = e.new;
                    backoff.snooze();
                }
            }
        }

        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop a value from the stack.
    ///
    /// Returns `None` if the stack is empty. An empty pop still counts as
    /// a completed operation.
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();
        let backoff = Backoff::new();

        loop {
            // Always start from a fresh head; `next` of a stale head may
            // have been unlinked by another pop.
            let head = self.head.load(Ordering::Acquire, &guard);

            // Safety: head is protected by the guard; it cannot be freed
            // while we are pinned.
            let Some(head_ref) = (unsafe { head.as_ref() }) else {
                self.operations.fetch_add(1, Ordering::Relaxed);
                return None;
            };

            let next = head_ref.next.load(Ordering::Acquire, &guard);

            match self.head.compare_exchange(
                head,
                next,
                Ordering::Release,
                Ordering::Relaxed,
                &guard,
            ) {
                Ok(_) => {
                    // Safety: the CAS unlinked head, so this thread is the
                    // only one that will ever move the value out. Other
                    // threads may still read `next`, which stays intact
                    // until the epoch advances.
                    let value = unsafe {
                        let value = ManuallyDrop::into_inner(ptr::read(&head_ref.value));
                        guard.defer_destroy(head);
                        value
                    };

                    self.operations.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                Err(_) => backoff.snooze(),
            }
        }
    }

    /// Number of completed push and pop calls.
    #[must_use]
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    /// Check if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Get the current contents of the stack, top to bottom.
    ///
    /// Memory-safe under concurrent access (the traversal is pinned), but
    /// only a consistent view when the stack is quiescent.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        let guard = epoch::pin();
        let mut result = Vec::new();
        let mut current = self.head.load(Ordering::Acquire, &guard);

        // Safety: every node reachable while pinned stays allocated.
        while let Some(node) = unsafe { current.as_ref() } {
            result.push(*node.value);
            current = node.next.load(Ordering::Acquire, &guard);
        }

        result
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for LockFreeStack<T> {
    fn push(&self, value: T) {
        LockFreeStack::push(self, value);
    }

    fn pop(&self) -> Option<T> {
        LockFreeStack::pop(self)
    }

    fn operation_count(&self) -> u64 {
        LockFreeStack::operation_count(self)
    }

    fn is_empty(&self) -> bool {
        LockFreeStack::is_empty(self)
    }

    fn name(&self) -> &'static str {
        "lock-free"
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        LockFreeStack::snapshot(self)
    }
}

// Safety: values are only ever moved out by the single pop that unlinked
// their node, so sharing the stack only requires `T: Send`.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        // Safety: `&mut self` means no other thread can reach the chain.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);

            while let Some(node) = current.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                let mut owned = current.into_owned();
                ManuallyDrop::drop(&mut owned.value);
                current = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    /// Counts how many times values were dropped.
    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_basic_push_pop() {
        let stack = LockFreeStack::new();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.operation_count(), 7);
    }

    #[test]
    fn test_empty_pop_counts_once() {
        let stack: LockFreeStack<u64> = LockFreeStack::new();

        for expected in 1..=5 {
            assert_eq!(stack.pop(), None);
            assert_eq!(stack.operation_count(), expected);
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn test_snapshot_is_top_to_bottom() {
        let stack = LockFreeStack::new();
        for i in 1..=4 {
            stack.push(i);
        }

        assert_eq!(stack.snapshot(), vec![4, 3, 2, 1]);
        // Snapshots are not operations.
        assert_eq!(stack.operation_count(), 4);
    }

    #[test]
    fn test_drop_releases_every_value_once() {
        let drops = Arc::new(AtomicUsize::new(0));

        {
            let stack = LockFreeStack::new();
            for _ in 0..3 {
                stack.push(DropCounter(Arc::clone(&drops)));
            }

            let popped = stack.pop();
            assert!(popped.is_some());
            drop(popped);
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }

        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_heap_payloads_survive_contention() {
        let stack = Arc::new(LockFreeStack::new());

        thread::scope(|s| {
            for t in 0..4 {
                let stack = Arc::clone(&stack);
                s.spawn(move || {
                    for i in 0..500 {
                        stack.push(format!("{t}-{i}"));
                        if i % 3 == 0 {
                            let _ = stack.pop();
                        }
                    }
                });
            }
        });

        let mut remaining = 0;
        while let Some(value) = stack.pop() {
            assert!(value.contains('-'));
            remaining += 1;
        }

        // 4 threads x 500 pushes, 4 x 167 pops during the run.
        assert_eq!(remaining, 4 * 500 - 4 * 167);
    }
}
