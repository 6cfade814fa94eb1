//! Planning module for access changes.
//!
//! This module compares desired and observed tuples, turns the difference
//! into an ordered plan of writes, and applies it.

mod diff;
mod executor;
mod plan;

pub use diff::{AccessDiff, DiffEngine};
pub use executor::{ApplyReport, PlanExecutor};
pub use plan::{AccessPlan, ActionType, PlannedAction};
