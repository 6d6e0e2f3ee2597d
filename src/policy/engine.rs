//! Batch requirement analysis.
//!
//! Folds the per-action rules of a proposed batch into one approval
//! requirement, keeping the strictest execution mode seen.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::action::ActionDescriptor;
use crate::policy::evaluator::{self, ActionContribution};
use crate::policy::registry::PolicyRegistry;
use crate::policy::types::ApprovalRequirement;

/// Outcome of analysing a batch, with the rule each action contributed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementReport {
    pub requirement: ApprovalRequirement,
    pub contributions: Vec<ActionContribution>,
    /// Index of the action whose rule set the final verdict, if any action raised it.
    pub deciding_action: Option<usize>,
}

/// Compute the combined approval requirement for a batch.
pub fn analyze(registry: &PolicyRegistry, actions: &[ActionDescriptor]) -> ApprovalRequirement {
    analyze_detailed(registry, actions).requirement
}

/// Like [`analyze`], also returning every action's contribution.
///
/// Every action is inspected even once the strictest mode has been reached.
/// On equal rank the earlier action keeps its council.
pub fn analyze_detailed(registry: &PolicyRegistry, actions: &[ActionDescriptor]) -> RequirementReport {
    let mut requirement = ApprovalRequirement::default();
    let mut deciding_action = None;
    let mut contributions = Vec::with_capacity(actions.len());

    for (index, action) in actions.iter().enumerate() {
        let contribution = evaluator::evaluate_action(registry, index, action);
        let mode = contribution.rule.execution_mode;

        if mode.rank() > requirement.mode.rank() {
            requirement = ApprovalRequirement::from_rule(&contribution.rule);
            deciding_action = Some(index);
        }
        contributions.push(contribution);
    }

    RequirementReport {
        requirement,
        contributions,
        deciding_action,
    }
}

/// Whether the collected approvals meet a requirement.
pub fn check_satisfied(requirement: &ApprovalRequirement, dao_approved: bool, council_approved: bool) -> bool {
    requirement.mode.is_satisfied(dao_approved, council_approved)
}
