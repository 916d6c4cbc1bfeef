//! The contract shared by every benchmarked stack.

use std::sync::Arc;

/// A LIFO stack safe to share between threads without external locking.
///
/// `operation_count` is incremented exactly once per completed `push` or
/// `pop`, including pops that found the stack empty. Read while operations
/// are in flight it may lag behind; once they complete it is exact.
pub trait ConcurrentStack<T>: Send + Sync {
    /// Push a value onto the top of the stack.
    fn push(&self, value: T);

    /// Pop the top value, or `None` if the stack is empty.
    fn pop(&self) -> Option<T>;

    /// Number of completed push and pop calls.
    fn operation_count(&self) -> u64;

    /// Whether the stack was observed empty.
    fn is_empty(&self) -> bool;

    /// Short name used in progress lines and reports.
    fn name(&self) -> &'static str;

    /// Copy of the current contents, top to bottom.
    ///
    /// Diagnostic only: exact when no operation is in flight, otherwise a
    /// best-effort view that may mix states.
    fn snapshot(&self) -> Vec<T>
    where
        T: Copy;
}

impl<T, S> ConcurrentStack<T> for Arc<S>
where
    S: ConcurrentStack<T> + ?Sized,
{
    fn push(&self, value: T) {
        (**self).push(value);
    }

    fn pop(&self) -> Option<T> {
        (**self).pop()
    }

    fn operation_count(&self) -> u64 {
        (**self).operation_count()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        (**self).snapshot()
    }
}
