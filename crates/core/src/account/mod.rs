//! Account resolution for dev sessions.
//!
//! Splits the decision from its side effects: `rules` holds the ordered,
//! independently testable selection rules; `resolver` executes the chosen
//! rule's prompts, provisioning, and credential persistence.

/// Async execution of a rule decision.
pub mod resolver;
/// Pure, ordered account-selection rules.
pub mod rules;

pub use resolver::{AccountResolver, Resolution};
pub use rules::{RuleDecision, RuleInput, capability_gap, decide, recommended_class};
