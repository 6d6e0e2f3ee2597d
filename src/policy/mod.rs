//! Approval-policy engine.
//!
//! Stores per-type, per-object and per-file approval rules, resolves them
//! through the override hierarchy, and folds a batch of proposed actions into
//! a single approval requirement.

pub mod types;
pub mod type_key;
pub mod registry;
pub mod resolver;
pub mod permission;
pub mod evaluator;
pub mod engine;

pub use types::{ApprovalMode, ApprovalRequirement, ChangeOutcome, PendingChange, PolicyRule, PolicyTarget};
pub use type_key::TypeKey;
pub use registry::PolicyRegistry;
pub use resolver::Resolution;
pub use permission::validate_change_permission;
pub use evaluator::{ActionContribution, RuleSource};
pub use engine::{analyze, analyze_detailed, check_satisfied, RequirementReport};
