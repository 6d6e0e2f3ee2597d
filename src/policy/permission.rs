//! Change-permission checks.
//!
//! Decides whether the originator of a pending modification may change a rule,
//! based on the rule's change-control fields.

use crate::error::{PolicyError, Result, UnauthorizedReason};
use crate::policy::types::{ApprovalMode, PolicyRule};
use crate::types::{Address, DaoId};

/// Check that `proposer` may change `existing`.
///
/// `DaoAndCouncil` only gates that the proposer is one of the two parties.
/// Requiring both signatures is the job of the co-execution layer that wraps
/// the change; it is not enforced here.
pub fn validate_change_permission(existing: &PolicyRule, proposer: Address, dao_id: DaoId) -> Result<()> {
    let is_dao = proposer == dao_id;
    if existing.change_mode == ApprovalMode::DaoOnly {
        return authorize(is_dao, UnauthorizedReason::RequiresDao);
    }

    let council = existing.change_council.ok_or(PolicyError::MissingCouncilId {
        mode: existing.change_mode,
    })?;
    let is_council = proposer == council;

    match existing.change_mode {
        ApprovalMode::CouncilOnly => authorize(is_council, UnauthorizedReason::RequiresCouncil),
        ApprovalMode::DaoOrCouncil => authorize(is_dao || is_council, UnauthorizedReason::RequiresDaoOrCouncil),
        ApprovalMode::DaoAndCouncil => authorize(is_dao || is_council, UnauthorizedReason::RequiresDaoAndCouncil),
        ApprovalMode::DaoOnly => authorize(is_dao, UnauthorizedReason::RequiresDao),
    }
}

fn authorize(allowed: bool, reason: UnauthorizedReason) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(PolicyError::Unauthorized(reason))
    }
}
