//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking a single named property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name, e.g. `NoLostElements`
    pub name: String,
    /// Whether the property held
    pub holds: bool,
    /// Human-readable violation message (only when `holds` is false)
    pub violation: Option<String>,
    /// Failure path, when the checker could build one
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// Create a passing result.
    #[must_use]
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// Create a failing result.
    #[must_use]
    pub fn fail(
        name: impl Into<String>,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name: name.into(),
            holds: false,
            violation: Some(violation.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.violation {
            None => write!(f, "[PASS] {}", self.name),
            Some(violation) => write!(f, "[FAIL] {}: {}", self.name, violation),
        }
    }
}

/// Anything that can evaluate a set of properties.
pub trait PropertyChecker {
    /// Evaluate every property and return one result per property.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True when every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the failing results.
    fn failures(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }
}
