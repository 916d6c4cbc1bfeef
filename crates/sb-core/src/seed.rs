//! Reproducible seeds for randomized runs.

/// Environment variable consulted for a fixed seed.
pub const SEED_ENV_VAR: &str = "STACKBENCH_SEED";

/// Get a seed from `STACKBENCH_SEED` or generate a random one.
///
/// Prints the seed so a failing randomized test can be rerun with
/// `STACKBENCH_SEED=<seed> cargo test`.
///
/// # Panics
///
/// Panics if `STACKBENCH_SEED` is set but is not a valid `u64`.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var(SEED_ENV_VAR) {
        Ok(s) => {
            let seed: u64 = s.parse().expect("STACKBENCH_SEED must be a valid u64");
            println!("{SEED_ENV_VAR}={seed} (from environment)");
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("{SEED_ENV_VAR}={seed} (randomly generated)");
            seed
        }
    }
}
