//! # sb-bench
//!
//! Throughput harness comparing the stacks in `sb-stacks`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sb_bench::{BenchConfig, BenchHarness, StackKind};
//!
//! let harness = BenchHarness::new(BenchConfig::default())?;
//! let report = harness.run_kind(StackKind::LockFree)?;
//! println!("{}", report.summary_line());
//! # Ok::<(), sb_bench::BenchError>(())
//! ```
//!
//! ## Reproducibility
//!
//! Pushed values come from seeded generators. The seed is part of every
//! report; rerun with `STACKBENCH_SEED=<seed>` (or `--seed`) to replay the
//! same value streams. Thread scheduling is not reproducible.

pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod report;

pub use config::{BenchConfig, StackKind, StopPolicy};
pub use error::BenchError;
pub use harness::{BenchHarness, VerifiedReport};
pub use logging::init_logging;
pub use report::{BenchReport, Comparison};
