//! Change notifications emitted by the dispatcher.
//!
//! Each event carries a fingerprint chained to its predecessor so a consumer
//! can detect gaps or tampering in a replayed stream.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::policy::types::PolicyTarget;
use crate::types::{Address, CouncilId};

/// What changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEventKind {
    RuleApplied { target: PolicyTarget },
    ChangeScheduled { target: PolicyTarget, effective_at_ms: u64 },
    ChangeFinalized { target: PolicyTarget },
    ChangeCancelled { target: PolicyTarget },
    ChangeAbandoned { target: PolicyTarget },
    DefaultFileRuleSet,
    DefaultFileRuleCleared,
    CouncilRegistered { council: CouncilId },
}

/// A sequence-ordered, hash-chained change notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Strictly increasing, starting at 1.
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// Who originated the change (proposer, or the finalizing caller).
    pub actor: Address,
    pub kind: ChangeEventKind,
    /// SHA3-256(prev_fingerprint || sequence || timestamp_ms || actor || kind_json).
    pub fingerprint: [u8; 32],
}

impl ChangeEvent {
    /// Create an event chained onto `prev`.
    pub(crate) fn new(
        prev: &[u8; 32],
        sequence: u64,
        timestamp_ms: u64,
        actor: Address,
        kind: ChangeEventKind,
    ) -> Result<Self, serde_json::Error> {
        let kind_bytes = serde_json::to_vec(&kind)?;
        let fingerprint = Self::compute_fingerprint(prev, sequence, timestamp_ms, &actor, &kind_bytes);
        Ok(Self {
            sequence,
            timestamp_ms,
            actor,
            kind,
            fingerprint,
        })
    }

    /// Recompute the fingerprint from the event's fields.
    pub fn derive_fingerprint(&self, prev: &[u8; 32]) -> Option<[u8; 32]> {
        let kind_bytes: Vec<u8> = serde_json::to_vec(&self.kind).ok()?;
        Some(Self::compute_fingerprint(
            prev,
            self.sequence,
            self.timestamp_ms,
            &self.actor,
            &kind_bytes,
        ))
    }

    fn compute_fingerprint(
        prev: &[u8; 32],
        sequence: u64,
        timestamp_ms: u64,
        actor: &Address,
        kind_bytes: &[u8],
    ) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(prev);
        hasher.update(&sequence.to_le_bytes());
        hasher.update(&timestamp_ms.to_le_bytes());
        hasher.update(actor.as_bytes());
        hasher.update(kind_bytes);
        hasher.finalize().into()
    }
}
