//! Progress tracking for plan application.
//!
//! [`ApplyProgress`] is handed to the executor by value and returned with the
//! outcome, so the counters always have exactly one owner.

use crate::error::{ProviderError, ResourceStatus};

use super::plan::{OpCounts, Step, StepOp};

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Not started.
    Pending,
    /// Provider call in flight.
    Executing,
    /// Finished without error.
    Succeeded,
    /// Finished with an error; the status says whether the resource state is known.
    Failed(ResourceStatus),
}

/// Accumulated outcome of applying a plan.
#[derive(Debug, Clone)]
pub struct ApplyProgress {
    steps: usize,
    failed: usize,
    ops: OpCounts,
    maybe_corrupt: bool,
    states: Vec<StepState>,
}

/// Hooks fired around every provider call.
///
/// `before` runs immediately before a step's provider call and `after`
/// immediately after it, exactly once per executed step.
pub trait StepObserver {
    /// Called before step `index` is applied.
    fn before(&mut self, index: usize, step: &Step);

    /// Called after step `index` was applied.
    fn after(&mut self, index: usize, step: &Step, result: Result<(), &ProviderError>);
}

/// Observer that ignores every event.
impl StepObserver for () {
    fn before(&mut self, _index: usize, _step: &Step) {}

    fn after(&mut self, _index: usize, _step: &Step, _result: Result<(), &ProviderError>) {}
}

impl ApplyProgress {
    /// Creates a tracker for a plan with `len` steps, all pending.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            steps: 0,
            failed: 0,
            ops: OpCounts::default(),
            maybe_corrupt: false,
            states: vec![StepState::Pending; len],
        }
    }

    /// Marks a step as executing.
    pub fn begin(&mut self, index: usize) {
        self.set(index, StepState::Executing);
    }

    /// Records a successful step.
    pub fn succeed(&mut self, index: usize, op: StepOp) {
        self.set(index, StepState::Succeeded);
        self.steps += 1;
        self.ops.record(op);
    }

    /// Records a failed step. An `Unknown` status marks the deployment as
    /// possibly corrupt for good.
    pub fn fail(&mut self, index: usize, status: ResourceStatus) {
        self.set(index, StepState::Failed(status));
        self.failed += 1;
        if status == ResourceStatus::Unknown {
            self.maybe_corrupt = true;
        }
    }

    fn set(&mut self, index: usize, state: StepState) {
        if let Some(slot) = self.states.get_mut(index) {
            *slot = state;
        }
    }

    /// Number of steps that completed successfully.
    #[must_use]
    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Number of steps that failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Successful steps per operation.
    #[must_use]
    pub const fn ops(&self) -> &OpCounts {
        &self.ops
    }

    /// True once any step has failed with an unknown resource status.
    #[must_use]
    pub const fn maybe_corrupt(&self) -> bool {
        self.maybe_corrupt
    }

    /// State of one step, if the index is in range.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<StepState> {
        self.states.get(index).copied()
    }

    /// States of all steps, in plan order.
    #[must_use]
    pub fn states(&self) -> &[StepState] {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_states() {
        let mut progress = ApplyProgress::new(3);
        progress.begin(0);
        assert_eq!(progress.state(0), Some(StepState::Executing));
        progress.succeed(0, StepOp::Create);
        progress.begin(1);
        progress.fail(1, ResourceStatus::Ok);

        assert_eq!(progress.steps(), 1);
        assert_eq!(progress.failed(), 1);
        assert_eq!(progress.ops().get(StepOp::Create), 1);
        assert_eq!(progress.state(1), Some(StepState::Failed(ResourceStatus::Ok)));
        assert_eq!(progress.state(2), Some(StepState::Pending));
        assert!(!progress.maybe_corrupt());
    }

    #[test]
    fn test_maybe_corrupt_is_sticky() {
        let mut progress = ApplyProgress::new(3);
        progress.fail(0, ResourceStatus::Unknown);
        progress.succeed(1, StepOp::Update);
        progress.fail(2, ResourceStatus::Ok);
        assert!(progress.maybe_corrupt());
    }
}
