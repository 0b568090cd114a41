//! Planning module for deployment operations.
//!
//! This module compares an old snapshot with a desired one, builds the
//! ordered plan of steps between them, and applies that plan against the
//! resource providers while tracking progress.

mod diff;
mod executor;
mod plan;
mod progress;

pub use diff::{ArrayDiff, DiffEngine, ObjectDiff, ValueDiff};
pub use executor::{ApplyOutcome, PlanExecutor};
pub use plan::{OpCounts, Plan, PlanBuilder, Step, StepOp, NAME_PROPERTY};
pub use progress::{ApplyProgress, StepObserver, StepState};
