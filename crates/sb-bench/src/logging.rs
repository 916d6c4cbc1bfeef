//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` overrides `default_directive`. Stdout is left to the report
/// so it can be piped. Calling this twice is harmless.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
