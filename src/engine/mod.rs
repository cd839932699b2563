//! Local in-memory query engine
//!
//! Evaluates bound expression trees against row snapshots.
//!
//! # Evaluation rules
//!
//! - Synchronous, no suspension points
//! - Deterministic: same tree + same rows = same result
//! - No type coercion in comparisons
//! - Stable sorting
//! - Unbound query roots fail as unsupported, never as empty results

mod compare;
mod evaluator;
mod result;

pub use compare::ValueOrdering;
pub use evaluator::LocalEngine;
pub use result::Evaluated;
