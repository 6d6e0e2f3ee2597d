//! Governance dispatcher for one DAO's policy registry.
//!
//! Gates every policy mutation behind two change-permission checks (the
//! meta-policy registered on the request's action type, then the existing
//! policy on the target) and applies it to a staged copy of the registry that
//! is swapped in only once every request has succeeded. Change events are
//! recorded after the commit and never affect whether it happens.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::action::ActionDescriptor;
use crate::error::{PolicyError, UnauthorizedReason};
use crate::events::{ChangeEvent, ChangeEventKind, ChangeLog};
use crate::policy::engine::{self, RequirementReport};
use crate::policy::permission::validate_change_permission;
use crate::policy::registry::PolicyRegistry;
use crate::policy::type_key::TypeKey;
use crate::policy::types::{ApprovalRequirement, ChangeOutcome, PolicyRule, PolicyTarget};
use crate::types::{Address, CouncilId, DaoId};

/// Action type whose policy governs setting type rules.
pub const SET_TYPE_POLICY_ACTION: &str = "policy_actions::SetTypePolicy";
/// Action type whose policy governs setting object rules.
pub const SET_OBJECT_POLICY_ACTION: &str = "policy_actions::SetObjectPolicy";
/// Action type whose policy governs setting file rules, including the default file rule.
pub const SET_FILE_POLICY_ACTION: &str = "policy_actions::SetFilePolicy";
/// Action type whose policy governs resetting any rule to the default.
pub const REMOVE_POLICY_ACTION: &str = "policy_actions::RemovePolicy";
/// Action type whose policy governs cancelling a pending change.
pub const CANCEL_POLICY_CHANGE_ACTION: &str = "policy_actions::CancelPolicyChange";
/// Action type whose policy governs registering councils.
pub const REGISTER_COUNCIL_ACTION: &str = "policy_actions::RegisterCouncil";

/// Errors returned by the dispatcher.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A governance request against the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyChangeRequest {
    SetRule { target: PolicyTarget, rule: PolicyRule },
    RemoveRule { target: PolicyTarget },
    SetDefaultFileRule { rule: PolicyRule },
    ClearDefaultFileRule,
    RegisterCouncil { council: CouncilId },
    FinalizePending { target: PolicyTarget },
    CancelPending { target: PolicyTarget },
    CleanupAbandoned { candidates: Vec<PolicyTarget> },
}

impl PolicyChangeRequest {
    /// The action type whose registered policy gates this request.
    ///
    /// `None` for permissionless requests.
    pub fn meta_action(&self) -> Option<&'static str> {
        match self {
            PolicyChangeRequest::SetRule { target, .. } => Some(match target {
                PolicyTarget::Type(_) => SET_TYPE_POLICY_ACTION,
                PolicyTarget::Object(_) => SET_OBJECT_POLICY_ACTION,
                PolicyTarget::File(_) => SET_FILE_POLICY_ACTION,
            }),
            PolicyChangeRequest::RemoveRule { .. } => Some(REMOVE_POLICY_ACTION),
            PolicyChangeRequest::SetDefaultFileRule { .. } | PolicyChangeRequest::ClearDefaultFileRule => {
                Some(SET_FILE_POLICY_ACTION)
            }
            PolicyChangeRequest::RegisterCouncil { .. } => Some(REGISTER_COUNCIL_ACTION),
            PolicyChangeRequest::CancelPending { .. } => Some(CANCEL_POLICY_CHANGE_ACTION),
            PolicyChangeRequest::FinalizePending { .. } | PolicyChangeRequest::CleanupAbandoned { .. } => None,
        }
    }

    /// Finalize and cleanup can be cranked by anyone once their conditions hold.
    pub fn is_permissionless(&self) -> bool {
        self.meta_action().is_none()
    }
}

/// What a dispatched request did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Changed(ChangeOutcome),
    Finalized(PolicyRule),
    Cancelled,
    DefaultFileRuleUpdated,
    CouncilRegistered { newly_registered: bool },
    Cleaned { removed: usize },
}

/// Owns the policy registry and change log for one DAO.
#[derive(Clone, Debug)]
pub struct GovernanceDispatcher {
    dao_id: DaoId,
    registry: PolicyRegistry,
    log: ChangeLog,
}

impl GovernanceDispatcher {
    pub fn new(dao_id: DaoId, registry: PolicyRegistry) -> Self {
        Self::with_change_log(dao_id, registry, ChangeLog::new())
    }

    /// Use a caller-configured log, e.g. one with a different retention.
    pub fn with_change_log(dao_id: DaoId, registry: PolicyRegistry, log: ChangeLog) -> Self {
        Self { dao_id, registry, log }
    }

    pub fn dao_id(&self) -> DaoId {
        self.dao_id
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.log
    }

    pub fn events(&self) -> &[ChangeEvent] {
        self.log.events()
    }

    /// Take the retained change events, e.g. to forward them to an indexer.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        self.log.drain_events()
    }

    /// Authorize and apply a single request.
    pub fn submit(
        &mut self,
        request: PolicyChangeRequest,
        proposer: Address,
        now_ms: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut outcomes = self.submit_batch(alloc::vec![request], proposer, now_ms)?;
        Ok(outcomes.remove(0))
    }

    /// Authorize and apply a batch of requests atomically.
    ///
    /// Each request is checked against the state left by the ones before it.
    /// If any request fails, nothing is committed. Events carry `now_ms`, or the
    /// log's last timestamp if the caller's clock is behind it.
    pub fn submit_batch(
        &mut self,
        requests: Vec<PolicyChangeRequest>,
        proposer: Address,
        now_ms: u64,
    ) -> Result<Vec<DispatchOutcome>, DispatchError> {
        let mut staged = self.registry.clone();
        let mut outcomes = Vec::with_capacity(requests.len());
        let mut kinds = Vec::new();

        for request in requests {
            let result = authorize(&staged, self.dao_id, &request, proposer)
                .and_then(|()| apply(&mut staged, request.clone(), proposer, now_ms, &mut kinds));
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(%proposer, ?request, error = %err, "policy change rejected");
                    return Err(err.into());
                }
            }
        }

        self.registry = staged;
        info!(%proposer, count = outcomes.len(), now_ms, "policy changes committed");

        let stamp = now_ms.max(self.log.last_timestamp_ms());
        if let Err(err) = self.log.record_all(proposer, kinds, stamp) {
            warn!(%proposer, now_ms, error = %err, "change events not recorded");
        }
        Ok(outcomes)
    }

    /// Combined approval requirement for a proposed action batch.
    pub fn analyze(&self, actions: &[ActionDescriptor]) -> ApprovalRequirement {
        engine::analyze(&self.registry, actions)
    }

    pub fn analyze_detailed(&self, actions: &[ActionDescriptor]) -> RequirementReport {
        engine::analyze_detailed(&self.registry, actions)
    }

    /// Whether the given approvals are enough to execute the batch.
    pub fn authorize_execution(
        &self,
        actions: &[ActionDescriptor],
        dao_approved: bool,
        council_approved: bool,
    ) -> bool {
        let requirement = self.analyze(actions);
        engine::check_satisfied(&requirement, dao_approved, council_approved)
    }
}

fn authorize(
    registry: &PolicyRegistry,
    dao_id: DaoId,
    request: &PolicyChangeRequest,
    proposer: Address,
) -> Result<(), PolicyError> {
    let Some(meta_action) = request.meta_action() else {
        return Ok(());
    };

    // Intents originate from the DAO itself or one of its councils.
    if proposer != dao_id && !registry.is_council_registered(&proposer) {
        return Err(PolicyError::Unauthorized(UnauthorizedReason::RequiresDaoOrCouncil));
    }
    if matches!(request, PolicyChangeRequest::RegisterCouncil { .. }) && proposer != dao_id {
        return Err(PolicyError::Unauthorized(UnauthorizedReason::RequiresDao));
    }

    // Absent policies do not restrict.
    let meta_key = TypeKey::parse(meta_action)?;
    if let Ok(meta_rule) = registry.rule_for(&meta_key) {
        validate_change_permission(meta_rule, proposer, dao_id)?;
    }
    if let Some(existing) = existing_rule(registry, request) {
        validate_change_permission(existing, proposer, dao_id)?;
    }
    if let PolicyChangeRequest::SetRule { rule, .. } | PolicyChangeRequest::SetDefaultFileRule { rule } = request {
        check_councils_registered(registry, rule)?;
    }
    Ok(())
}

/// A rule naming an unknown council could never be changed again.
fn check_councils_registered(registry: &PolicyRegistry, rule: &PolicyRule) -> Result<(), PolicyError> {
    for council in [rule.execution_council, rule.change_council].into_iter().flatten() {
        if !registry.is_council_registered(&council) {
            return Err(PolicyError::UnregisteredCouncil { council });
        }
    }
    Ok(())
}

fn existing_rule<'a>(registry: &'a PolicyRegistry, request: &PolicyChangeRequest) -> Option<&'a PolicyRule> {
    match request {
        PolicyChangeRequest::SetRule { target, .. }
        | PolicyChangeRequest::RemoveRule { target }
        | PolicyChangeRequest::CancelPending { target } => match target {
            PolicyTarget::Type(key) => registry.rule_for(key).ok(),
            PolicyTarget::Object(id) => registry.object_rule(id),
            PolicyTarget::File(name) => registry.file_rule(name),
        },
        PolicyChangeRequest::SetDefaultFileRule { .. } | PolicyChangeRequest::ClearDefaultFileRule => {
            registry.default_file_rule()
        }
        _ => None,
    }
}

fn apply(
    registry: &mut PolicyRegistry,
    request: PolicyChangeRequest,
    proposer: Address,
    now_ms: u64,
    kinds: &mut Vec<ChangeEventKind>,
) -> Result<DispatchOutcome, PolicyError> {
    let outcome = match request {
        PolicyChangeRequest::SetRule { target, rule } => {
            let outcome = registry.set_rule(&target, rule, proposer, now_ms)?;
            kinds.push(change_kind(target, outcome));
            DispatchOutcome::Changed(outcome)
        }
        PolicyChangeRequest::RemoveRule { target } => {
            let outcome = registry.remove_rule(&target, proposer, now_ms)?;
            kinds.push(change_kind(target, outcome));
            DispatchOutcome::Changed(outcome)
        }
        PolicyChangeRequest::SetDefaultFileRule { rule } => {
            registry.set_default_file_rule(rule)?;
            kinds.push(ChangeEventKind::DefaultFileRuleSet);
            DispatchOutcome::DefaultFileRuleUpdated
        }
        PolicyChangeRequest::ClearDefaultFileRule => {
            if registry.clear_default_file_rule().is_some() {
                kinds.push(ChangeEventKind::DefaultFileRuleCleared);
            }
            DispatchOutcome::DefaultFileRuleUpdated
        }
        PolicyChangeRequest::RegisterCouncil { council } => {
            let newly_registered = registry.register_council(council)?;
            if newly_registered {
                kinds.push(ChangeEventKind::CouncilRegistered { council });
            }
            DispatchOutcome::CouncilRegistered { newly_registered }
        }
        PolicyChangeRequest::FinalizePending { target } => {
            let rule = registry.finalize_pending(&target, now_ms)?;
            kinds.push(ChangeEventKind::ChangeFinalized { target });
            DispatchOutcome::Finalized(rule)
        }
        PolicyChangeRequest::CancelPending { target } => {
            registry.cancel_pending(&target)?;
            kinds.push(ChangeEventKind::ChangeCancelled { target });
            DispatchOutcome::Cancelled
        }
        PolicyChangeRequest::CleanupAbandoned { candidates } => {
            let removed = registry.drain_abandoned(&candidates, now_ms);
            let count = removed.len();
            kinds.extend(removed.into_iter().map(|target| ChangeEventKind::ChangeAbandoned { target }));
            DispatchOutcome::Cleaned { removed: count }
        }
    };
    Ok(outcome)
}

fn change_kind(target: PolicyTarget, outcome: ChangeOutcome) -> ChangeEventKind {
    match outcome {
        ChangeOutcome::Applied => ChangeEventKind::RuleApplied { target },
        ChangeOutcome::Scheduled { effective_at_ms } => ChangeEventKind::ChangeScheduled {
            target,
            effective_at_ms,
        },
    }
}
