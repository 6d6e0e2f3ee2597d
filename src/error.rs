//! Error types for policy registry operations.
//!
//! Every rejected call surfaces one of these synchronously. A rejected
//! mutation never leaves the registry partially updated.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::types::ApprovalMode;
use crate::types::Address;

/// The bounded collections held by a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyCollection {
    TypeRules,
    ObjectRules,
    FileRules,
    Councils,
}

impl fmt::Display for PolicyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyCollection::TypeRules => "type rules",
            PolicyCollection::ObjectRules => "object rules",
            PolicyCollection::FileRules => "file rules",
            PolicyCollection::Councils => "councils",
        };
        f.write_str(name)
    }
}

/// Which party the change-permission check wanted to see.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnauthorizedReason {
    RequiresDao,
    RequiresCouncil,
    RequiresDaoOrCouncil,
    /// Only gates that the proposer is one of the two parties; joint
    /// signing is enforced by the co-execution layer.
    RequiresDaoAndCouncil,
}

impl fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnauthorizedReason::RequiresDao => "requires the DAO",
            UnauthorizedReason::RequiresCouncil => "requires the security council",
            UnauthorizedReason::RequiresDaoOrCouncil => "requires the DAO or the security council",
            UnauthorizedReason::RequiresDaoAndCouncil => "requires both the DAO and the security council",
        };
        f.write_str(text)
    }
}

/// Errors raised by the registry, resolver, permission validator and dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No policy registered for {key}")]
    PolicyNotFound { key: String },
    #[error("Capacity exceeded for {collection}: limit is {limit}")]
    CapacityExceeded {
        collection: PolicyCollection,
        limit: usize,
    },
    #[error("No pending change for {key}")]
    PendingChangeNotFound { key: String },
    #[error("Delay not elapsed: change becomes effective at {effective_at_ms}, now is {now_ms}")]
    DelayNotElapsed { effective_at_ms: u64, now_ms: u64 },
    #[error("Mode {mode} requires a council id")]
    MissingCouncilId { mode: ApprovalMode },
    #[error("Unauthorized: change {0}")]
    Unauthorized(UnauthorizedReason),
    #[error("Council {council} is not registered")]
    UnregisteredCouncil { council: Address },
    #[error("Invalid approval mode {0} (expected 0..=3)")]
    InvalidMode(u8),
    #[error("Invalid type key {key:?}: {reason}")]
    InvalidTypeKey { key: String, reason: &'static str },
    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("Snapshot serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Result type alias for policy registry operations.
pub type Result<T> = core::result::Result<T, PolicyError>;
