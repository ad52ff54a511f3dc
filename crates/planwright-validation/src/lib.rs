//! Validation of extracted deliverables and compiled task sets
//!
//! Validation is all-or-nothing: every issue in a set is collected into one
//! [`ValidationError`](planwright_utils::error::ValidationError) and nothing
//! from a rejected set is persisted.

mod candidate;
mod deliverables;
pub mod rules;
mod tasks;

pub use candidate::DeliverableCandidate;
pub use deliverables::DeliverableValidator;
pub use tasks::{union_skills, validate_tasks};
