//! Policy types for approval routing.
//!
//! Provides the approval modes, the rule value stored per key, staged
//! (delayed) rule changes, and the transient approval requirement produced by
//! batch analysis.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::policy::type_key::TypeKey;
use crate::types::{Address, CouncilId, FileName, ObjectId};

/// Who must approve an execution or a policy change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ApprovalMode {
    DaoOnly = 0,
    CouncilOnly = 1,
    DaoOrCouncil = 2,
    DaoAndCouncil = 3,
}

impl ApprovalMode {
    /// Strictness rank used when combining a batch.
    ///
    /// Note the rank order differs from the wire encoding:
    /// `DaoAndCouncil (3) > CouncilOnly (2) > DaoOrCouncil (1) > DaoOnly (0)`.
    pub fn rank(&self) -> u8 {
        match self {
            ApprovalMode::DaoOnly => 0,
            ApprovalMode::DaoOrCouncil => 1,
            ApprovalMode::CouncilOnly => 2,
            ApprovalMode::DaoAndCouncil => 3,
        }
    }

    pub fn requires_dao(&self) -> bool {
        !matches!(self, ApprovalMode::CouncilOnly)
    }

    pub fn requires_council(&self) -> bool {
        !matches!(self, ApprovalMode::DaoOnly)
    }

    /// Whether the given approvals satisfy this mode.
    pub fn is_satisfied(&self, dao_approved: bool, council_approved: bool) -> bool {
        match self {
            ApprovalMode::DaoOnly => dao_approved,
            ApprovalMode::CouncilOnly => council_approved,
            ApprovalMode::DaoOrCouncil => dao_approved || council_approved,
            ApprovalMode::DaoAndCouncil => dao_approved && council_approved,
        }
    }
}

impl TryFrom<u8> for ApprovalMode {
    type Error = PolicyError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(ApprovalMode::DaoOnly),
            1 => Ok(ApprovalMode::CouncilOnly),
            2 => Ok(ApprovalMode::DaoOrCouncil),
            3 => Ok(ApprovalMode::DaoAndCouncil),
            other => Err(PolicyError::InvalidMode(other)),
        }
    }
}

impl From<ApprovalMode> for u8 {
    fn from(mode: ApprovalMode) -> u8 {
        mode as u8
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalMode::DaoOnly => "DAO_ONLY",
            ApprovalMode::CouncilOnly => "COUNCIL_ONLY",
            ApprovalMode::DaoOrCouncil => "DAO_OR_COUNCIL",
            ApprovalMode::DaoAndCouncil => "DAO_AND_COUNCIL",
        };
        f.write_str(name)
    }
}

/// Approval rule for one governed key.
///
/// Replaced wholesale on update, never partially mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub execution_council: Option<CouncilId>,
    pub execution_mode: ApprovalMode,
    pub change_council: Option<CouncilId>,
    pub change_mode: ApprovalMode,
    pub change_delay_ms: u64,
}

impl Default for PolicyRule {
    fn default() -> Self {
        Self::dao_only()
    }
}

impl PolicyRule {
    /// The hard default: DAO approval for everything, changes apply immediately.
    pub const fn dao_only() -> Self {
        Self {
            execution_council: None,
            execution_mode: ApprovalMode::DaoOnly,
            change_council: None,
            change_mode: ApprovalMode::DaoOnly,
            change_delay_ms: 0,
        }
    }

    /// Rule whose execution needs `mode` with `council`; changes stay DAO-only.
    pub fn execution(mode: ApprovalMode, council: Option<CouncilId>) -> Self {
        Self {
            execution_council: council,
            execution_mode: mode,
            ..Self::dao_only()
        }
    }

    /// Set the change-control fields.
    pub fn with_change_control(
        mut self,
        mode: ApprovalMode,
        council: Option<CouncilId>,
        delay_ms: u64,
    ) -> Self {
        self.change_mode = mode;
        self.change_council = council;
        self.change_delay_ms = delay_ms;
        self
    }

    /// Build a rule from raw mode bytes as received from a caller.
    pub fn from_raw(
        execution_council: Option<CouncilId>,
        execution_mode: u8,
        change_council: Option<CouncilId>,
        change_mode: u8,
        change_delay_ms: u64,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            execution_council,
            execution_mode: ApprovalMode::try_from(execution_mode)?,
            change_council,
            change_mode: ApprovalMode::try_from(change_mode)?,
            change_delay_ms,
        })
    }

    /// Council-requiring modes must name a council.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.execution_mode.requires_council() && self.execution_council.is_none() {
            return Err(PolicyError::MissingCouncilId {
                mode: self.execution_mode,
            });
        }
        if self.change_mode.requires_council() && self.change_council.is_none() {
            return Err(PolicyError::MissingCouncilId {
                mode: self.change_mode,
            });
        }
        Ok(())
    }
}

/// A staged rule replacement waiting out its delay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub new_rule: PolicyRule,
    pub effective_at_ms: u64,
    pub proposer_id: Address,
    pub proposed_at_ms: u64,
}

impl PendingChange {
    pub fn is_ready(&self, now_ms: u64) -> bool {
        now_ms >= self.effective_at_ms
    }

    /// Proposed strictly before `now_ms - threshold_ms`.
    pub fn is_abandoned(&self, now_ms: u64, threshold_ms: u64) -> bool {
        match now_ms.checked_sub(threshold_ms) {
            Some(cutoff) => self.proposed_at_ms < cutoff,
            None => false,
        }
    }
}

/// One key in one of the registry's three rule collections.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyTarget {
    Type(TypeKey),
    Object(ObjectId),
    File(FileName),
}

impl fmt::Display for PolicyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyTarget::Type(key) => write!(f, "type:{}", key),
            PolicyTarget::Object(id) => write!(f, "object:{}", id),
            PolicyTarget::File(name) => write!(f, "file:{}", name),
        }
    }
}

/// Whether a mutation took effect or was staged behind a delay.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOutcome {
    Applied,
    Scheduled { effective_at_ms: u64 },
}

/// Combined approval requirement for a batch of actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub needs_dao: bool,
    pub needs_council: bool,
    pub council_id: Option<CouncilId>,
    pub mode: ApprovalMode,
}

impl Default for ApprovalRequirement {
    fn default() -> Self {
        Self::from_mode(ApprovalMode::DaoOnly, None)
    }
}

impl ApprovalRequirement {
    /// Derive the approval flags from the mode.
    pub fn from_mode(mode: ApprovalMode, council_id: Option<CouncilId>) -> Self {
        Self {
            needs_dao: mode.requires_dao(),
            needs_council: mode.requires_council(),
            council_id,
            mode,
        }
    }

    /// Execution-side requirement of a rule.
    pub fn from_rule(rule: &PolicyRule) -> Self {
        Self::from_mode(rule.execution_mode, rule.execution_council)
    }
}
