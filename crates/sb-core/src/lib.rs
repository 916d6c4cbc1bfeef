//! # sb-core
//!
//! Core types and invariants for the stackbench stacks.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `StackProperties`, the view a stack exposes so its invariants can be
//!   checked after a run
//!
//! Nothing here depends on a particular stack implementation. The stacks
//! live in `sb-stacks`; the throughput harness lives in `sb-bench`.

pub mod counterexample;
pub mod invariants;
pub mod property;
pub mod seed;

pub use counterexample::{Counterexample, StateSnapshot};
pub use invariants::stack::{
    CheckMode, StackHistory, StackOpType, StackOperation, StackProperties, StackPropertyChecker,
    ValueCounts,
};
pub use property::{PropertyChecker, PropertyResult};
pub use seed::get_or_generate_seed;
