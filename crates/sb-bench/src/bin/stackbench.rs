//! stackbench: measure stack throughput under concurrent push/pop load.
//!
//! # Usage
//!
//! ```bash
//! stackbench                                  # lock-free stack, 2+2 workers, 500 ms
//! stackbench --stack all                      # lock-free vs locked
//! stackbench --stack locked --pushers 8 --poppers 8 --duration-ms 2000
//! stackbench --stack all --verify --json
//! ```
//!
//! Progress and the final summary go to stdout; logs go to stderr
//! (`RUST_LOG=info` for run details).

use std::process;

use clap::Parser;
use tracing::info;

use sb_bench::config::{
    DURATION_MILLIS_DEFAULT, INITIAL_FILL_DEFAULT, POPPER_THREADS_DEFAULT, PUSHER_THREADS_DEFAULT,
};
use sb_bench::{init_logging, BenchConfig, BenchError, BenchHarness, StackKind, StopPolicy};

/// Measure how many push/pop operations a concurrent stack completes in a
/// fixed window.
#[derive(Parser, Debug)]
#[command(name = "stackbench")]
#[command(about = "Lock-free vs locked stack throughput benchmark")]
struct Cli {
    /// Number of push-only worker threads.
    #[arg(long, env = "STACKBENCH_PUSHERS", default_value_t = PUSHER_THREADS_DEFAULT)]
    pushers: usize,

    /// Number of pop-only worker threads.
    #[arg(long, env = "STACKBENCH_POPPERS", default_value_t = POPPER_THREADS_DEFAULT)]
    poppers: usize,

    /// Measurement window in milliseconds.
    #[arg(long, env = "STACKBENCH_DURATION_MS", default_value_t = DURATION_MILLIS_DEFAULT)]
    duration_ms: u64,

    /// Values pushed before the workers start.
    #[arg(long, env = "STACKBENCH_INITIAL_FILL", default_value_t = INITIAL_FILL_DEFAULT)]
    initial_fill: usize,

    /// Seed for the pushed values (random if not set).
    #[arg(long, env = "STACKBENCH_SEED")]
    seed: Option<u64>,

    /// Stack to run: lock-free, locked, deferred, a comma list, or all.
    #[arg(long, default_value = "lock-free")]
    stack: String,

    /// Print the report as JSON instead of summary lines.
    #[arg(long)]
    json: bool,

    /// Record every operation and check the stack invariants after the run.
    ///
    /// Recording serializes bookkeeping behind a mutex, so throughput
    /// numbers from a verified run are not comparable to plain runs.
    #[arg(long)]
    verify: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging("warn");

    let kinds = match StackKind::parse_selection(&cli.stack) {
        Ok(kinds) => kinds,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    // A single plain run leaves its workers running when the window
    // closes; the process exits right after printing.
    let stop_policy = if kinds.len() > 1 || cli.verify {
        StopPolicy::Join
    } else {
        StopPolicy::Abandon
    };

    let config = BenchConfig {
        pusher_threads: cli.pushers,
        popper_threads: cli.poppers,
        duration_millis: cli.duration_ms,
        initial_fill: cli.initial_fill,
        seed: cli.seed,
        stop_policy,
        progress: !cli.json,
    };

    let harness = match BenchHarness::new(config) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = run(&cli, &harness, &kinds) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli, harness: &BenchHarness, kinds: &[StackKind]) -> Result<(), BenchError> {
    if cli.verify {
        let mut verified = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            verified.push(harness.run_verified(kind)?);
        }

        if cli.json {
            println!("{}", serde_json::to_string_pretty(&verified)?);
        } else {
            for v in &verified {
                println!("{}", v.report.summary_line());
                println!("Verified: {}", v.properties.join(", "));
            }
        }
        return Ok(());
    }

    if let [kind] = kinds {
        let report = harness.run_kind(*kind)?;
        info!("{}", report.format());
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report.summary_line());
        }
        return Ok(());
    }

    let comparison = harness.compare(kinds)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        for line in comparison.summary_lines() {
            println!("{line}");
        }
    }
    Ok(())
}
