//! Counterexample representation and rendering.
//!
//! When a property violation is detected, a counterexample shows the
//! state the checker saw and the seed needed to reproduce the run.

use std::fmt::Write;

/// A counterexample showing the failure path.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// Sequence of state snapshots, ordered by step
    pub states: Vec<StateSnapshot>,
    /// Seed of the run that produced the failure (if applicable)
    pub seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of stack state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample carrying the seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Render as plain text.
    ///
    /// ```text
    /// STACKBENCH_SEED=12345
    ///
    /// Failure: Element 7 lost
    ///
    /// Step 3: after pop
    ///   pushed = {7: 1}
    ///   popped = {}
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.seed {
            let _ = writeln!(output, "STACKBENCH_SEED={seed}\n");
        }

        if let Some(ref desc) = self.description {
            let _ = writeln!(output, "Failure: {desc}\n");
        }

        if self.states.is_empty() {
            output.push_str("(no states recorded)\n");
            return output;
        }

        for state in &self.states {
            let _ = writeln!(output, "Step {}: {}", state.step, state.description);
            for (name, value) in &state.variables {
                let _ = writeln!(output, "  {name} = {value}");
            }
        }

        output
    }
}
