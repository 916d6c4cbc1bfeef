//! Invariant checks for the concurrent stacks.
//!
//! - `stack`: NoLostElements, NoDuplicates, CounterExact, LIFO_Order

pub mod stack;

pub use stack::{StackHistory, StackProperties, StackPropertyChecker};
