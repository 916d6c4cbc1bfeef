//! Lock-free Treiber stack with quiescent-state reclamation.
//!
//! Popped nodes are not freed on pop. The winning pop moves the value out
//! and pushes the node onto a private retire list; the list is walked and
//! freed in `Drop`, where `&mut self` proves no thread can still hold a
//! stale pointer. Because no node address is recycled while the stack is
//! alive, a stale head can never compare equal to a new node (no ABA).
//!
//! Memory grows with the number of pops, so this stack suits bounded runs
//! and model checking. `LockFreeStack` is the epoch-reclaimed variant.
//!
//! # Usage
//!
//! For normal tests:
//! ```bash
//! cargo test -p sb-stacks
//! ```
//!
//! For loom tests:
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test -p sb-stacks --release deferred_stack
//! ```

#[cfg(loom)]
use loom::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

#[cfg(not(loom))]
use crossbeam_utils::Backoff;
#[cfg(not(loom))]
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use std::mem::ManuallyDrop;
use std::ptr;

use crate::stack::ConcurrentStack;

/// A lock-free stack that retires popped nodes until it is dropped.
pub struct DeferredStack<T> {
    head: AtomicPtr<Node<T>>,
    /// Unlinked nodes awaiting `Drop`
    retired: AtomicPtr<Node<T>>,
    operations: AtomicU64,
}

struct Node<T> {
    value: ManuallyDrop<T>,
    /// Written only before the node is published
    next: *mut Node<T>,
    /// Written only by the pop that unlinked the node
    retired_next: *mut Node<T>,
}

impl<T> DeferredStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            retired: AtomicPtr::new(ptr::null_mut()),
            operations: AtomicU64::new(0),
        }
    }

    /// Push a value onto the stack.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: ptr::null_mut(),
            retired_next: ptr::null_mut(),
        }));

        #[cfg(not(loom))]
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire);

            // Safety: node is not yet published; we have exclusive access.
            unsafe {
                (*node).next = head;
            }

            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(_) => {
                    #[cfg(loom)]
                    loom::thread::yield_now();
                    #[cfg(not(loom))]
                    backoff.snooze();
                }
            }
        }

        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop a value from the stack.
    ///
    /// Returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        #[cfg(not(loom))]
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire);

            if head.is_null() {
                self.operations.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            // Safety: nodes are never freed before Drop, and `next` is
            // immutable once published.
            let next = unsafe { (*head).next };

            match self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => {
                    // Safety: the CAS made us the unique owner of head's
                    // value; concurrent readers only touch `next`.
                    let value = unsafe { ManuallyDrop::into_inner(ptr::read(&(*head).value)) };
                    self.retire(head);
                    self.operations.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                Err(_) => {
                    #[cfg(loom)]
                    loom::thread::yield_now();
                    #[cfg(not(loom))]
                    backoff.snooze();
                }
            }
        }
    }

    fn retire(&self, node: *mut Node<T>) {
        loop {
            let top = self.retired.load(Ordering::Relaxed);

            // Safety: only the pop that unlinked `node` writes this field,
            // and nothing reads it before Drop.
            unsafe {
                (*node).retired_next = top;
            }

            if self
                .retired
                .compare_exchange(top, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
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
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Number of nodes waiting on the retire list.
    pub fn retired_len(&mut self) -> usize {
        let mut count = 0;
        let mut current = self.retired.load(Ordering::Acquire);
        while !current.is_null() {
            count += 1;
            // Safety: `&mut self`; retired nodes are alive until Drop.
            current = unsafe { (*current).retired_next };
        }
        count
    }

    /// Copy of the contents, top to bottom.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        let mut result = Vec::new();
        let mut current = self.head.load(Ordering::Acquire);
        while !current.is_null() {
            // Safety: nodes stay allocated until Drop; a value moved out by
            // a concurrent pop is `Copy`, so its bits remain readable.
            unsafe {
                result.push(*(*current).value);
                current = (*current).next;
            }
        }
        result
    }
}

impl<T> Default for DeferredStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for DeferredStack<T> {
    fn push(&self, value: T) {
        DeferredStack::push(self, value);
    }

    fn pop(&self) -> Option<T> {
        DeferredStack::pop(self)
    }

    fn operation_count(&self) -> u64 {
        DeferredStack::operation_count(self)
    }

    fn is_empty(&self) -> bool {
        DeferredStack::is_empty(self)
    }

    fn name(&self) -> &'static str {
        "deferred"
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        DeferredStack::snapshot(self)
    }
}

// SAFETY: nodes move between threads only as owned values of T: Send.
unsafe impl<T: Send> Send for DeferredStack<T> {}
unsafe impl<T: Send> Sync for DeferredStack<T> {}

impl<T> Drop for DeferredStack<T> {
    fn drop(&mut self) {
        // Live chain: values still owned by the stack.
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            // Safety: `&mut self`; every live node came from Box::into_raw.
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next;
            unsafe { ManuallyDrop::drop(&mut node.value) };
        }

        // Retire list: values were moved out by their pops.
        let mut current = self.retired.load(Ordering::Relaxed);
        while !current.is_null() {
            // Safety: as above; values are not dropped a second time.
            let node = unsafe { Box::from_raw(current) };
            current = node.retired_next;
        }
    }
}


/// Model-checked interleavings of push, pop and the counter.
#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_push_push() {
        loom::model(|| {
            let stack = Arc::new(DeferredStack::new());

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.push(1));
            let h2 = thread::spawn(move || s2.push(2));

            h1.join().unwrap();
            h2.join().unwrap();

            let mut values = vec![];
            while let Some(v) = stack.pop() {
                values.push(v);
            }
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
        });
    }

    #[test]
    fn test_push_pop() {
        loom::model(|| {
            let stack = Arc::new(DeferredStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.push(2));
            let h2 = thread::spawn(move || s2.pop());

            h1.join().unwrap();
            let popped = h2.join().unwrap();

            // Either value, depending on interleaving, but never empty.
            assert!(matches!(popped, Some(1) | Some(2)));

            let mut remaining = vec![];
            while let Some(v) = stack.pop() {
                remaining.push(v);
            }
            assert_eq!(remaining.len(), 1);
            assert_ne!(remaining[0], popped.unwrap());
        });
    }

    #[test]
    fn test_concurrent_pop() {
        loom::model(|| {
            let stack = Arc::new(DeferredStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());

            let r1 = h1.join().unwrap();
            let r2 = h2.join().unwrap();

            // One pop wins the single value, the other sees empty.
            match (r1, r2) {
                (Some(1), None) | (None, Some(1)) => {}
                other => panic!("Unexpected result: {other:?}"),
            }
        });
    }

    #[test]
    fn test_counter_exact_after_join() {
        loom::model(|| {
            let stack = Arc::new(DeferredStack::new());

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || {
                s1.push(1);
                s1.pop()
            });
            let h2 = thread::spawn(move || s2.pop());

            h1.join().unwrap();
            h2.join().unwrap();

            assert_eq!(stack.operation_count(), 3);
        });
    }
}
