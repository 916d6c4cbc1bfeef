//! Mutex-guarded linked stack, the throughput baseline.
//!
//! Every operation, including reading the counter, runs inside one
//! critical section on a single `std::sync::Mutex`, so its correctness is
//! trivial. It allocates a node per push like the lock-free stack so the
//! comparison measures synchronization, not allocation strategy.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::stack::ConcurrentStack;

/// A linked stack serialized by one lock.
pub struct LockedStack<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    head: Option<Box<Node<T>>>,
    operations: u64,
}

struct Node<T> {
    value: T,
    next: Option<Box<Node<T>>>,
}

impl<T> LockedStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                head: None,
                operations: 0,
            }),
        }
    }

    // Operations never panic while holding the lock, but a poisoned mutex
    // still guards a consistent chain, so recover it rather than propagate.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a value onto the stack.
    pub fn push(&self, value: T) {
        let mut inner = self.lock();
        let next = inner.head.take();
        inner.head = Some(Box::new(Node { value, next }));
        inner.operations += 1;
    }

    /// Pop a value from the stack; an empty pop still counts.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        inner.operations += 1;

        let node = inner.head.take()?;
        let Node { value, next } = *node;
        inner.head = next;
        Some(value)
    }

    /// Number of completed push and pop calls.
    #[must_use]
    pub fn operation_count(&self) -> u64 {
        self.lock().operations
    }

    /// Check if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().head.is_none()
    }

    /// Copy of the contents, top to bottom.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        let inner = self.lock();
        let mut result = Vec::new();
        let mut current = inner.head.as_deref();
        while let Some(node) = current {
            result.push(node.value);
            current = node.next.as_deref();
        }
        result
    }
}

impl<T> Default for LockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for LockedStack<T> {
    fn push(&self, value: T) {
        LockedStack::push(self, value);
    }

    fn pop(&self) -> Option<T> {
        LockedStack::pop(self)
    }

    fn operation_count(&self) -> u64 {
        LockedStack::operation_count(self)
    }

    fn is_empty(&self) -> bool {
        LockedStack::is_empty(self)
    }

    fn name(&self) -> &'static str {
        "locked"
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        LockedStack::snapshot(self)
    }
}

impl<T> Drop for LockedStack<T> {
    fn drop(&mut self) {
        // Unlink iteratively; the default recursive drop of a long
        // `Box` chain overflows the thread stack.
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut current = inner.head.take();
        while let Some(mut node) = current {
            current = node.next.take();
        }
    }
}
