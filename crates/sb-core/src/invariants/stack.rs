//! Stack invariants.
//!
//! | Property | Description | Mode |
//! |----------|-------------|------|
//! | NoLostElements | Every pushed element is in the stack or was popped | both |
//! | NoDuplicates | No element is returned or present more often than pushed | both |
//! | CounterExact | Operation counter equals pushes + pops, empty pops included | both |
//! | LIFO_Order | Replaying the history against a model stack reproduces every pop | sequential |
//!
//! Values may repeat (the harness pushes random integers), so accounting is
//! done over multisets rather than sets.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::counterexample::{Counterexample, StateSnapshot};
use crate::property::{PropertyChecker, PropertyResult};

/// Multiset of values: value -> number of occurrences.
pub type ValueCounts<T> = HashMap<T, u64>;

/// State a stack exposes for property checking.
///
/// Implementations are expected to be quiescent while the checker reads
/// them; the results are meaningless if operations are still in flight.
pub trait StackProperties<T> {
    /// Every value that has been pushed, with multiplicity.
    fn pushed_elements(&self) -> ValueCounts<T>;

    /// Every value returned by a successful pop, with multiplicity.
    fn popped_elements(&self) -> ValueCounts<T>;

    /// Number of pops that observed an empty stack.
    fn empty_pops(&self) -> u64;

    /// Current contents of the stack (top to bottom).
    fn current_contents(&self) -> Vec<T>;

    /// Operation history in completion order, if one was recorded.
    fn history(&self) -> Option<StackHistory<T>>;

    /// The stack's own operation counter.
    fn operation_count(&self) -> u64;
}

/// History of stack operations in the order they completed.
#[derive(Debug, Clone)]
pub struct StackHistory<T> {
    pub operations: Vec<StackOperation<T>>,
}

/// A single stack operation.
#[derive(Debug, Clone)]
pub struct StackOperation<T> {
    pub op_type: StackOpType,
    /// Element pushed, or element returned by a pop
    pub element: Option<T>,
    /// Step number for ordering (starts at 1)
    pub step: u64,
}

/// Type of stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    Push,
    Pop,
    PopEmpty,
}

impl<T> StackHistory<T> {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Record a push operation.
    pub fn record_push(&mut self, element: T, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(StackOperation {
            op_type: StackOpType::Push,
            element: Some(element),
            step,
        });
    }

    /// Record a pop operation.
    pub fn record_pop(&mut self, element: Option<T>, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        let op_type = if element.is_some() {
            StackOpType::Pop
        } else {
            StackOpType::PopEmpty
        };
        self.operations.push(StackOperation {
            op_type,
            element,
            step,
        });
    }
}

impl<T> Default for StackHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Which properties the checker evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// History is a true sequential execution; LIFO order is checked.
    Sequential,
    /// History came from several threads and is not a linearization;
    /// only accounting properties are checked.
    Concurrent,
}

/// Property checker for stack implementations.
pub struct StackPropertyChecker<'a, T, S: StackProperties<T>> {
    stack: &'a S,
    mode: CheckMode,
    seed: Option<u64>,
    _value: PhantomData<fn() -> T>,
}

/// Everything read from the stack, captured once per `check_all`.
struct Observed<T> {
    pushed: ValueCounts<T>,
    popped: ValueCounts<T>,
    present: ValueCounts<T>,
    contents: Vec<T>,
    empty_pops: u64,
    operation_count: u64,
}

impl<'a, T, S> StackPropertyChecker<'a, T, S>
where
    T: Eq + Hash + Clone + Debug,
    S: StackProperties<T>,
{
    /// Create a sequential-mode checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a S) -> Self {
        Self {
            stack,
            mode: CheckMode::Sequential,
            seed: None,
            _value: PhantomData,
        }
    }

    /// Switch to concurrent mode (skips history-order checks).
    #[must_use]
    pub fn concurrent(mut self) -> Self {
        self.mode = CheckMode::Concurrent;
        self
    }

    /// Attach the seed of the run for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Current check mode.
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    fn observe(&self) -> Observed<T> {
        let contents = self.stack.current_contents();
        let mut present: ValueCounts<T> = HashMap::new();
        for value in &contents {
            *present.entry(value.clone()).or_default() += 1;
        }

        Observed {
            pushed: self.stack.pushed_elements(),
            popped: self.stack.popped_elements(),
            present,
            contents,
            empty_pops: self.stack.empty_pops(),
            operation_count: self.stack.operation_count(),
        }
    }

    fn counterexample(&self, description: String, observed: &Observed<T>) -> Counterexample {
        let mut ce = match self.seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        };
        ce.add_state(StateSnapshot {
            step: 1,
            description: "quiescent stack".to_string(),
            variables: vec![
                ("pushed".to_string(), format!("{:?}", observed.pushed)),
                ("popped".to_string(), format!("{:?}", observed.popped)),
                ("contents".to_string(), format!("{:?}", observed.contents)),
            ],
        });
        ce.with_description(description)
    }

    /// Every element that was pushed must either be in the stack or
    /// have been popped.
    fn check_no_lost_elements(&self, observed: &Observed<T>) -> PropertyResult {
        for (element, &pushed) in &observed.pushed {
            let popped = observed.popped.get(element).copied().unwrap_or(0);
            let present = observed.present.get(element).copied().unwrap_or(0);

            if popped + present < pushed {
                let message = format!(
                    "Element {element:?} pushed {pushed} times but only {popped} popped and {present} present"
                );
                let ce = self.counterexample(message.clone(), observed);
                return PropertyResult::fail("NoLostElements", message, Some(ce));
            }
        }

        PropertyResult::pass("NoLostElements")
    }

    /// No element is popped twice, resurrected after a pop, or present
    /// more often than it was pushed.
    fn check_no_duplicates(&self, observed: &Observed<T>) -> PropertyResult {
        let seen = observed.popped.keys().chain(observed.present.keys());

        for element in seen {
            let pushed = observed.pushed.get(element).copied().unwrap_or(0);
            let popped = observed.popped.get(element).copied().unwrap_or(0);
            let present = observed.present.get(element).copied().unwrap_or(0);

            if popped + present > pushed {
                let message = format!(
                    "Element {element:?} pushed {pushed} times but {popped} popped and {present} present"
                );
                let ce = self.counterexample(message.clone(), observed);
                return PropertyResult::fail("NoDuplicates", message, Some(ce));
            }
        }

        PropertyResult::pass("NoDuplicates")
    }

    /// The stack's counter equals the number of completed operations.
    fn check_counter_exact(&self, observed: &Observed<T>) -> PropertyResult {
        let pushes: u64 = observed.pushed.values().sum();
        let pops: u64 = observed.popped.values().sum();
        let expected = pushes + pops + observed.empty_pops;

        if observed.operation_count != expected {
            return PropertyResult::fail(
                "CounterExact",
                format!(
                    "Counter reads {} but {} pushes + {} pops + {} empty pops completed",
                    observed.operation_count, pushes, pops, observed.empty_pops
                ),
                None,
            );
        }

        PropertyResult::pass("CounterExact")
    }

    /// Replays the history against a model stack: every pop must return
    /// the model's top, empty pops must see an empty model, and the model
    /// must end equal to the current contents.
    fn check_lifo_order(&self, observed: &Observed<T>) -> PropertyResult {
        let Some(history) = self.stack.history() else {
            return PropertyResult::pass("LIFO_Order");
        };

        let mut model: Vec<T> = Vec::new();

        for op in &history.operations {
            match op.op_type {
                StackOpType::Push => {
                    if let Some(ref e) = op.element {
                        model.push(e.clone());
                    }
                }
                StackOpType::Pop => {
                    let Some(ref returned) = op.element else {
                        continue;
                    };
                    match model.pop() {
                        Some(ref expected) if expected != returned => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                format!(
                                    "LIFO violated: pop returned {returned:?} but model expected {expected:?} (step {})",
                                    op.step
                                ),
                                None,
                            );
                        }
                        None => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                format!(
                                    "LIFO violated: pop returned {returned:?} but model stack was empty (step {})",
                                    op.step
                                ),
                                None,
                            );
                        }
                        _ => {}
                    }
                }
                StackOpType::PopEmpty => {
                    if !model.is_empty() {
                        return PropertyResult::fail(
                            "LIFO_Order",
                            format!(
                                "LIFO violated: pop returned None but model has {} elements (step {})",
                                model.len(),
                                op.step
                            ),
                            None,
                        );
                    }
                }
            }
        }

        model.reverse();
        if model != observed.contents {
            let message = format!(
                "Stack contents {:?} differ from replayed model {:?}",
                observed.contents, model
            );
            let ce = self.counterexample(message.clone(), observed);
            return PropertyResult::fail("LIFO_Order", message, Some(ce));
        }

        PropertyResult::pass("LIFO_Order")
    }
}

impl<T, S> PropertyChecker for StackPropertyChecker<'_, T, S>
where
    T: Eq + Hash + Clone + Debug,
    S: StackProperties<T>,
{
    fn check_all(&self) -> Vec<PropertyResult> {
        let observed = self.observe();
        let mut results = vec![
            self.check_no_lost_elements(&observed),
            self.check_no_duplicates(&observed),
            self.check_counter_exact(&observed),
        ];
        if self.mode == CheckMode::Sequential {
            results.push(self.check_lifo_order(&observed));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Model stack that can be corrupted by hand.
    struct TestStack {
        pushed: ValueCounts<u64>,
        popped: ValueCounts<u64>,
        empty_pops: u64,
        contents: Vec<u64>,
        history: StackHistory<u64>,
        operations: u64,
    }

    impl TestStack {
        fn new() -> Self {
            Self {
                pushed: HashMap::new(),
                popped: HashMap::new(),
                empty_pops: 0,
                contents: Vec::new(),
                history: StackHistory::new(),
                operations: 0,
            }
        }

        fn push(&mut self, val: u64) {
            *self.pushed.entry(val).or_default() += 1;
            self.contents.insert(0, val);
            self.operations += 1;
            self.history.record_push(val, self.operations);
        }

        fn pop(&mut self) -> Option<u64> {
            let val = if self.contents.is_empty() {
                None
            } else {
                Some(self.contents.remove(0))
            };
            match val {
                Some(v) => *self.popped.entry(v).or_default() += 1,
                None => self.empty_pops += 1,
            }
            self.operations += 1;
            self.history.record_pop(val, self.operations);
            val
        }
    }

    impl StackProperties<u64> for TestStack {
        fn pushed_elements(&self) -> ValueCounts<u64> {
            self.pushed.clone()
        }

        fn popped_elements(&self) -> ValueCounts<u64> {
            self.popped.clone()
        }

        fn empty_pops(&self) -> u64 {
            self.empty_pops
        }

        fn current_contents(&self) -> Vec<u64> {
            self.contents.clone()
        }

        fn history(&self) -> Option<StackHistory<u64>> {
            Some(self.history.clone())
        }

        fn operation_count(&self) -> u64 {
            self.operations
        }
    }

    fn result_named(results: &[PropertyResult], name: &str) -> PropertyResult {
        results
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no result named {name}"))
    }

    #[test]
    fn test_correct_stack_passes_all() {
        let mut stack = TestStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        stack.pop();
        stack.pop();
        stack.pop();
        stack.pop();
        stack.push(2);

        let checker = StackPropertyChecker::new(&stack);
        assert!(checker.all_hold(), "{:?}", checker.failures());
        assert_eq!(checker.check_all().len(), 4);
    }

    #[test]
    fn test_concurrent_mode_skips_lifo() {
        let stack = TestStack::new();
        let checker = StackPropertyChecker::new(&stack).concurrent();
        assert_eq!(checker.mode(), CheckMode::Concurrent);

        let results = checker.check_all();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.name != "LIFO_Order"));
    }

    #[test]
    fn test_lost_element_detected() {
        let mut stack = TestStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        stack.pop();
        // Element 2 vanishes from the chain.
        stack.contents = vec![1];

        let checker = StackPropertyChecker::new(&stack).with_seed(7);
        let no_lost = result_named(&checker.check_all(), "NoLostElements");
        assert!(!no_lost.holds);
        assert!(no_lost.violation.as_ref().unwrap().contains('2'));

        let rendered = no_lost.counterexample.unwrap().render();
        assert!(rendered.contains("STACKBENCH_SEED=7"));
    }

    #[test]
    fn test_duplicate_detected() {
        let mut stack = TestStack::new();
        stack.push(1);
        stack.push(2);
        stack.pop();
        // The popped node is reachable again.
        stack.contents = vec![2, 1];

        let checker = StackPropertyChecker::new(&stack);
        let no_dup = result_named(&checker.check_all(), "NoDuplicates");
        assert!(!no_dup.holds);
    }

    #[test]
    fn test_repeated_values_are_not_duplicates() {
        let mut stack = TestStack::new();
        stack.push(5);
        stack.push(5);
        stack.pop();

        let checker = StackPropertyChecker::new(&stack);
        assert!(checker.all_hold(), "{:?}", checker.failures());
    }

    #[test]
    fn test_counter_drift_detected() {
        let mut stack = TestStack::new();
        stack.push(1);
        stack.pop();
        stack.pop();
        stack.operations = 2;

        let checker = StackPropertyChecker::new(&stack);
        let counter = result_named(&checker.check_all(), "CounterExact");
        assert!(!counter.holds);
        assert!(counter.violation.unwrap().contains("1 empty pops"));
    }

    #[test]
    fn test_lifo_violation_detected() {
        let mut stack = TestStack::new();
        stack.push(1);
        stack.push(2);
        stack.pop();
        // Rewrite history so the pop claims to have returned the bottom.
        stack.history.operations[2].element = Some(1);

        let checker = StackPropertyChecker::new(&stack);
        let lifo = result_named(&checker.check_all(), "LIFO_Order");
        assert!(!lifo.holds);
        assert!(lifo.violation.unwrap().contains("model expected 2"));
    }
}
