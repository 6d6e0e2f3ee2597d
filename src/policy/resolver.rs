//! Rule lookup with fallback.
//!
//! Type lookups try the exact key, then its generic base, then the hard
//! default. Object lookups skip the generic step. File lookups use the
//! registry's default file rule as their second tier. Every projection
//! (`needs_council`, `council_for`, `mode_for`) goes through
//! [`PolicyRegistry::resolve_type`], so they can never disagree with it.

use alloc::string::ToString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolicyError, Result};
use crate::policy::registry::PolicyRegistry;
use crate::policy::type_key::TypeKey;
use crate::policy::types::{ApprovalMode, PolicyRule};
use crate::types::{CouncilId, ObjectId};

/// Which tier of the type lookup produced a rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// A rule registered on the full key.
    Exact,
    /// A rule registered on the key's generic base.
    Generic,
    /// Nothing registered; the hard default applies.
    Default,
}

impl PolicyRegistry {
    /// Resolve the rule for a (possibly parameterized) action type.
    pub fn resolve_type(&self, key: &TypeKey) -> PolicyRule {
        self.resolve_type_with_source(key).0
    }

    /// Resolve and report which tier matched.
    pub fn resolve_type_with_source(&self, key: &TypeKey) -> (PolicyRule, Resolution) {
        match self.lookup_type(key) {
            Some((rule, resolution)) => (rule.clone(), resolution),
            None => {
                debug!(%key, "no type rule registered, using default");
                (PolicyRule::dao_only(), Resolution::Default)
            }
        }
    }

    /// Strict variant used by change-permission checks: no hard default.
    pub fn rule_for(&self, key: &TypeKey) -> Result<&PolicyRule> {
        self.lookup_type(key)
            .map(|(rule, _)| rule)
            .ok_or_else(|| PolicyError::PolicyNotFound {
                key: key.to_string(),
            })
    }

    pub fn needs_council(&self, key: &TypeKey) -> bool {
        self.mode_for(key).requires_council()
    }

    pub fn council_for(&self, key: &TypeKey) -> Option<CouncilId> {
        self.resolve_type(key).execution_council
    }

    pub fn mode_for(&self, key: &TypeKey) -> ApprovalMode {
        self.resolve_type(key).execution_mode
    }

    /// Whether a rule is registered on exactly this key (no fallback).
    pub fn has_type_rule(&self, key: &TypeKey) -> bool {
        self.type_rules.rules.contains_key(key)
    }

    fn lookup_type(&self, key: &TypeKey) -> Option<(&PolicyRule, Resolution)> {
        if let Some(rule) = self.type_rules.rules.get(key) {
            return Some((rule, Resolution::Exact));
        }
        if key.is_parameterized() {
            let generic = key.generic();
            if let Some(rule) = self.type_rules.rules.get(&generic) {
                debug!(%key, %generic, "type rule resolved via generic base");
                return Some((rule, Resolution::Generic));
            }
        }
        None
    }

    /// The rule registered on this object, if any.
    pub fn object_rule(&self, id: &ObjectId) -> Option<&PolicyRule> {
        self.object_rules.rules.get(id)
    }

    /// Object rule, or the hard default.
    pub fn resolve_object(&self, id: &ObjectId) -> PolicyRule {
        self.object_rule(id).cloned().unwrap_or_else(PolicyRule::dao_only)
    }

    /// Strict object lookup.
    pub fn object_rule_for(&self, id: &ObjectId) -> Result<&PolicyRule> {
        self.object_rule(id).ok_or_else(|| PolicyError::PolicyNotFound {
            key: id.to_string(),
        })
    }

    /// The rule registered on this file, if any (the default file rule is not consulted).
    pub fn file_rule(&self, name: &str) -> Option<&PolicyRule> {
        self.file_rules.rules.get(name)
    }

    /// File rule, then the registry default file rule, then the hard default.
    pub fn resolve_file(&self, name: &str) -> PolicyRule {
        self.file_rule(name)
            .or(self.default_file_rule.as_ref())
            .cloned()
            .unwrap_or_else(PolicyRule::dao_only)
    }
}
