//! Operator policy evaluated on top of capability access levels.
//!
//! The execution engine always enforces a capability's declared access
//! level. A [`PolicyEngine`] can additionally deny or escalate individual
//! invocations, e.g. to switch a capability off for UI callers on a given
//! deployment without recompiling it.

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod decision;
pub mod engine;

pub use contracts::{PolicyAction, PolicyContext, PolicyRequest};
pub use decision::{DecisionKind, PolicyDecision};
pub use engine::{
    ActionMatcher, PolicyEngine, PolicyError, PolicyResult, PolicyRule, RuleBasedEngine,
    RuleMatcher,
};
