//! Policy registry: keyed approval rules with delayed changes.
//!
//! Three independent rule collections (action types, objects, files), each
//! paired with a map of staged changes, a registry-wide default file rule,
//! and a bounded set of registered councils.
//!
//! Every entry point checks all of its preconditions before it writes, so a
//! rejected call leaves the registry exactly as it was.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Display;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{PolicyCollection, PolicyError, Result};
use crate::policy::type_key::TypeKey;
use crate::policy::types::{ChangeOutcome, PendingChange, PolicyRule, PolicyTarget};
use crate::types::{Address, CouncilId, FileName, ObjectId};

/// Live rules for one collection plus their staged replacements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Ord + Serialize",
    deserialize = "K: Ord + Deserialize<'de>"
))]
pub(crate) struct RuleTable<K: Ord> {
    pub(crate) rules: BTreeMap<K, PolicyRule>,
    pub(crate) pending: BTreeMap<K, PendingChange>,
}

impl<K: Ord> Default for RuleTable<K> {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone + Display> RuleTable<K> {
    fn set(
        &mut self,
        key: K,
        rule: PolicyRule,
        proposer: Address,
        now_ms: u64,
        limit: usize,
        collection: PolicyCollection,
    ) -> Result<ChangeOutcome> {
        match self.rules.get(&key) {
            Some(existing) if existing.change_delay_ms > 0 => {
                let effective_at_ms = now_ms.saturating_add(existing.change_delay_ms);
                // Last proposal wins; there is no queue.
                self.pending.insert(
                    key,
                    PendingChange {
                        new_rule: rule,
                        effective_at_ms,
                        proposer_id: proposer,
                        proposed_at_ms: now_ms,
                    },
                );
                Ok(ChangeOutcome::Scheduled { effective_at_ms })
            }
            Some(_) => {
                self.rules.insert(key, rule);
                Ok(ChangeOutcome::Applied)
            }
            None => {
                if self.rules.len() >= limit {
                    return Err(PolicyError::CapacityExceeded { collection, limit });
                }
                self.rules.insert(key, rule);
                Ok(ChangeOutcome::Applied)
            }
        }
    }

    fn finalize(
        &mut self,
        key: &K,
        now_ms: u64,
        limit: usize,
        collection: PolicyCollection,
    ) -> Result<PolicyRule> {
        let pending = self
            .pending
            .get(key)
            .ok_or_else(|| PolicyError::PendingChangeNotFound {
                key: key.to_string(),
            })?;
        if !pending.is_ready(now_ms) {
            return Err(PolicyError::DelayNotElapsed {
                effective_at_ms: pending.effective_at_ms,
                now_ms,
            });
        }
        if !self.rules.contains_key(key) && self.rules.len() >= limit {
            return Err(PolicyError::CapacityExceeded { collection, limit });
        }

        let rule = self.cancel(key)?.new_rule;
        self.rules.insert(key.clone(), rule.clone());
        Ok(rule)
    }

    fn cancel(&mut self, key: &K) -> Result<PendingChange> {
        self.pending
            .remove(key)
            .ok_or_else(|| PolicyError::PendingChangeNotFound {
                key: key.to_string(),
            })
    }

    fn remove_if_abandoned(&mut self, key: &K, now_ms: u64, threshold_ms: u64) -> bool {
        let abandoned = self
            .pending
            .get(key)
            .map(|p| p.is_abandoned(now_ms, threshold_ms))
            .unwrap_or(false);
        if abandoned {
            self.pending.remove(key);
        }
        abandoned
    }
}

/// The approval-policy registry for one governed DAO.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRegistry {
    config: RegistryConfig,
    pub(crate) type_rules: RuleTable<TypeKey>,
    pub(crate) object_rules: RuleTable<ObjectId>,
    pub(crate) file_rules: RuleTable<FileName>,
    pub(crate) default_file_rule: Option<PolicyRule>,
    registered_councils: BTreeSet<CouncilId>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRegistry {
    /// Create an empty registry with the protocol ceilings.
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            type_rules: RuleTable::default(),
            object_rules: RuleTable::default(),
            file_rules: RuleTable::default(),
            default_file_rule: None,
            registered_councils: BTreeSet::new(),
        }
    }

    /// Create an empty registry with custom (lower) ceilings.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Set the rule for `target`.
    ///
    /// New keys are inserted immediately (subject to capacity). Existing keys
    /// are replaced immediately when their current rule has no change delay,
    /// otherwise the new rule is staged as a pending change.
    pub fn set_rule(
        &mut self,
        target: &PolicyTarget,
        rule: PolicyRule,
        proposer: Address,
        now_ms: u64,
    ) -> Result<ChangeOutcome> {
        rule.validate()?;
        let config = self.config;
        let outcome = match target {
            PolicyTarget::Type(key) => self.type_rules.set(
                key.clone(),
                rule,
                proposer,
                now_ms,
                config.max_type_rules,
                PolicyCollection::TypeRules,
            ),
            PolicyTarget::Object(id) => self.object_rules.set(
                *id,
                rule,
                proposer,
                now_ms,
                config.max_object_rules,
                PolicyCollection::ObjectRules,
            ),
            PolicyTarget::File(name) => self.file_rules.set(
                name.clone(),
                rule,
                proposer,
                now_ms,
                config.max_file_rules,
                PolicyCollection::FileRules,
            ),
        }?;

        match outcome {
            ChangeOutcome::Applied => info!(%target, %proposer, "policy rule applied"),
            ChangeOutcome::Scheduled { effective_at_ms } => {
                info!(%target, %proposer, effective_at_ms, "policy change scheduled")
            }
        }
        Ok(outcome)
    }

    /// Reset `target` to the hard default rule.
    ///
    /// Goes through the same delay path as any other change.
    pub fn remove_rule(
        &mut self,
        target: &PolicyTarget,
        proposer: Address,
        now_ms: u64,
    ) -> Result<ChangeOutcome> {
        self.set_rule(target, PolicyRule::dao_only(), proposer, now_ms)
    }

    /// Apply the staged change for `target` once its delay has elapsed.
    pub fn finalize_pending(&mut self, target: &PolicyTarget, now_ms: u64) -> Result<PolicyRule> {
        let config = self.config;
        let rule = match target {
            PolicyTarget::Type(key) => self.type_rules.finalize(
                key,
                now_ms,
                config.max_type_rules,
                PolicyCollection::TypeRules,
            ),
            PolicyTarget::Object(id) => self.object_rules.finalize(
                id,
                now_ms,
                config.max_object_rules,
                PolicyCollection::ObjectRules,
            ),
            PolicyTarget::File(name) => self.file_rules.finalize(
                name,
                now_ms,
                config.max_file_rules,
                PolicyCollection::FileRules,
            ),
        }?;
        info!(%target, now_ms, "pending policy change finalized");
        Ok(rule)
    }

    /// Drop the staged change for `target` without applying it.
    pub fn cancel_pending(&mut self, target: &PolicyTarget) -> Result<PendingChange> {
        let pending = match target {
            PolicyTarget::Type(key) => self.type_rules.cancel(key),
            PolicyTarget::Object(id) => self.object_rules.cancel(id),
            PolicyTarget::File(name) => self.file_rules.cancel(name),
        }?;
        info!(%target, "pending policy change cancelled");
        Ok(pending)
    }

    /// Remove abandoned pending changes among the candidate targets.
    ///
    /// Returns how many entries were removed. Only the supplied candidates are
    /// inspected.
    pub fn cleanup_abandoned(&mut self, candidates: &[PolicyTarget], now_ms: u64) -> usize {
        self.drain_abandoned(candidates, now_ms).len()
    }

    /// Like [`cleanup_abandoned`](Self::cleanup_abandoned) but returns the removed targets.
    pub fn drain_abandoned(&mut self, candidates: &[PolicyTarget], now_ms: u64) -> Vec<PolicyTarget> {
        let threshold = self.config.abandonment_threshold_ms;
        let mut removed = Vec::new();
        for target in candidates {
            let hit = match target {
                PolicyTarget::Type(key) => self.type_rules.remove_if_abandoned(key, now_ms, threshold),
                PolicyTarget::Object(id) => self.object_rules.remove_if_abandoned(id, now_ms, threshold),
                PolicyTarget::File(name) => self.file_rules.remove_if_abandoned(name, now_ms, threshold),
            };
            if hit {
                debug!(%target, now_ms, "abandoned pending change removed");
                removed.push(target.clone());
            }
        }
        removed
    }

    /// The staged change for `target`, if any.
    pub fn pending_change(&self, target: &PolicyTarget) -> Option<&PendingChange> {
        match target {
            PolicyTarget::Type(key) => self.type_rules.pending.get(key),
            PolicyTarget::Object(id) => self.object_rules.pending.get(id),
            PolicyTarget::File(name) => self.file_rules.pending.get(name),
        }
    }

    /// Set the rule used for files that have no rule of their own.
    pub fn set_default_file_rule(&mut self, rule: PolicyRule) -> Result<()> {
        rule.validate()?;
        self.default_file_rule = Some(rule);
        info!("default file rule set");
        Ok(())
    }

    pub fn clear_default_file_rule(&mut self) -> Option<PolicyRule> {
        self.default_file_rule.take()
    }

    pub fn default_file_rule(&self) -> Option<&PolicyRule> {
        self.default_file_rule.as_ref()
    }

    /// Register a council. Returns `false` if it was already registered.
    pub fn register_council(&mut self, council: CouncilId) -> Result<bool> {
        if self.registered_councils.contains(&council) {
            return Ok(false);
        }
        if self.registered_councils.len() >= self.config.max_councils {
            return Err(PolicyError::CapacityExceeded {
                collection: PolicyCollection::Councils,
                limit: self.config.max_councils,
            });
        }
        self.registered_councils.insert(council);
        info!(%council, "council registered");
        Ok(true)
    }

    pub fn is_council_registered(&self, council: &CouncilId) -> bool {
        self.registered_councils.contains(council)
    }

    pub fn councils(&self) -> impl Iterator<Item = &CouncilId> {
        self.registered_councils.iter()
    }

    pub fn type_rule_count(&self) -> usize {
        self.type_rules.rules.len()
    }

    pub fn object_rule_count(&self) -> usize {
        self.object_rules.rules.len()
    }

    pub fn file_rule_count(&self) -> usize {
        self.file_rules.rules.len()
    }

    pub fn council_count(&self) -> usize {
        self.registered_councils.len()
    }

    /// Total staged changes across all three collections.
    pub fn pending_count(&self) -> usize {
        self.type_rules.pending.len() + self.object_rules.pending.len() + self.file_rules.pending.len()
    }

    pub fn type_rules(&self) -> impl Iterator<Item = (&TypeKey, &PolicyRule)> {
        self.type_rules.rules.iter()
    }

    pub fn object_rules(&self) -> impl Iterator<Item = (&ObjectId, &PolicyRule)> {
        self.object_rules.rules.iter()
    }

    pub fn file_rules(&self) -> impl Iterator<Item = (&FileName, &PolicyRule)> {
        self.file_rules.rules.iter()
    }

    /// Serialize the full registry state to canonical JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PolicyError::Serialization {
            reason: format!("{}", e),
        })
    }

    /// Restore a registry from a JSON snapshot, re-checking its invariants.
    pub fn from_json(json: &str) -> Result<Self> {
        let registry: PolicyRegistry =
            serde_json::from_str(json).map_err(|e| PolicyError::Serialization {
                reason: format!("{}", e),
            })?;
        registry.check_invariants()?;
        Ok(registry)
    }

    /// SHA3-256 over the canonical JSON snapshot.
    pub fn state_digest(&self) -> Result<[u8; 32]> {
        let json = self.to_json()?;
        let mut hasher = Sha3_256::new();
        hasher.update(json.as_bytes());
        Ok(hasher.finalize().into())
    }

    fn check_invariants(&self) -> Result<()> {
        self.config.validate()?;

        let limits = [
            (self.type_rules.rules.len(), self.config.max_type_rules, PolicyCollection::TypeRules),
            (self.object_rules.rules.len(), self.config.max_object_rules, PolicyCollection::ObjectRules),
            (self.file_rules.rules.len(), self.config.max_file_rules, PolicyCollection::FileRules),
            (self.registered_councils.len(), self.config.max_councils, PolicyCollection::Councils),
        ];
        for (len, limit, collection) in limits {
            if len > limit {
                return Err(PolicyError::CapacityExceeded { collection, limit });
            }
        }

        let live = self
            .type_rules
            .rules
            .values()
            .chain(self.object_rules.rules.values())
            .chain(self.file_rules.rules.values())
            .chain(self.default_file_rule.iter());
        let staged = self
            .type_rules
            .pending
            .values()
            .chain(self.object_rules.pending.values())
            .chain(self.file_rules.pending.values())
            .map(|p| &p.new_rule);
        for rule in live.chain(staged) {
            rule.validate()?;
        }
        Ok(())
    }
}
