//! # sb-stacks
//!
//! Concurrent stacks compared by the stackbench harness.
//!
//! Every stack implements [`ConcurrentStack`]: push, pop, and an operation
//! counter bumped once per completed call (empty pops included).
//!
//! # Lock-Free Modules
//!
//! - `treiber_stack`: Treiber stack with epoch-based reclamation (the subject
//!   of the benchmark)
//! - `deferred_stack`: Treiber stack that retires popped nodes until drop;
//!   loom-compatible for model checking
//!
//! # Lock-Based Modules
//!
//! - `locked_stack`: linked stack behind a single mutex (the baseline)
//!
//! # Verification
//!
//! - `tracked_stack`: wrapper recording every operation so the invariants in
//!   `sb-core` can be checked after a run

pub mod deferred_stack;
pub mod locked_stack;
pub mod stack;
pub mod tracked_stack;
pub mod treiber_stack;

pub use deferred_stack::DeferredStack;
pub use locked_stack::LockedStack;
pub use stack::ConcurrentStack;
pub use tracked_stack::TrackedStack;
pub use treiber_stack::LockFreeStack;
