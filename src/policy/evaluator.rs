//! Deterministic per-action rule selection.
//!
//! Walks the override hierarchy for a single action: object or document rule
//! first, then the parameterized resource type, then the bare action type.
//! The first tier that matches wins outright; tiers are never merged.

use serde::{Deserialize, Serialize};

use crate::action::ActionDescriptor;
use crate::policy::registry::PolicyRegistry;
use crate::policy::resolver::Resolution;
use crate::policy::types::PolicyRule;
use crate::types::{FileName, ObjectId};

/// Where an action's rule came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    Object(ObjectId),
    File(FileName),
    /// The registry's default file rule, for a document with no rule of its own.
    DefaultFile(FileName),
    /// Type lookup on a coin- or capability-parameterized key.
    Resource(Resolution),
    /// Type lookup on the action's own key.
    ActionType(Resolution),
}

/// The rule one action contributes to a batch verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContribution {
    /// Position of the action in its batch.
    pub index: usize,
    pub source: RuleSource,
    pub rule: PolicyRule,
}

/// Select the governing rule for one action.
pub fn evaluate_action(registry: &PolicyRegistry, index: usize, action: &ActionDescriptor) -> ActionContribution {
    if let Some(id) = action.object_id() {
        if let Some(rule) = registry.object_rule(&id) {
            return ActionContribution {
                index,
                source: RuleSource::Object(id),
                rule: rule.clone(),
            };
        }
    }

    if let Some(name) = action.document_name() {
        if let Some(rule) = registry.file_rule(&name) {
            return ActionContribution {
                index,
                source: RuleSource::File(name),
                rule: rule.clone(),
            };
        }
        if let Some(rule) = registry.default_file_rule() {
            return ActionContribution {
                index,
                source: RuleSource::DefaultFile(name),
                rule: rule.clone(),
            };
        }
    }

    let (rule, resolution) = registry.resolve_type_with_source(&action.type_key);
    let source = if action.kind().is_resource_typed() && action.type_key.is_parameterized() {
        RuleSource::Resource(resolution)
    } else {
        RuleSource::ActionType(resolution)
    };

    ActionContribution { index, source, rule }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::type_key::TypeKey;
    use crate::policy::types::{ApprovalMode, PolicyTarget};
    use crate::types::Address;

    const DAO: Address = Address::new([0xDA; 32]);
    const COUNCIL: Address = Address::new([0xC0; 32]);

    fn key(s: &str) -> TypeKey {
        TypeKey::parse(s).unwrap()
    }

    #[test]
    fn test_object_rule_without_registration_falls_through() {
        let mut registry = PolicyRegistry::new();
        let type_rule = PolicyRule::execution(ApprovalMode::DaoOrCouncil, Some(COUNCIL));
        registry
            .set_rule(&PolicyTarget::Type(key("stream::CancelStreamAction")), type_rule.clone(), DAO, 0)
            .unwrap();

        let action = ActionDescriptor::with_object(key("stream::CancelStreamAction"), Address::new([4; 32]), &[]);
        let contribution = evaluate_action(&registry, 0, &action);
        assert_eq!(contribution.source, RuleSource::ActionType(Resolution::Exact));
        assert_eq!(contribution.rule, type_rule);
    }

    #[test]
    fn test_document_uses_default_file_rule_before_type() {
        let mut registry = PolicyRegistry::new();
        registry
            .set_rule(
                &PolicyTarget::Type(key("doc::UpdateLineAction")),
                PolicyRule::execution(ApprovalMode::CouncilOnly, Some(COUNCIL)),
                DAO,
                0,
            )
            .unwrap();
        let default = PolicyRule::execution(ApprovalMode::DaoAndCouncil, Some(COUNCIL));
        registry.set_default_file_rule(default.clone()).unwrap();

        let action = ActionDescriptor::with_document(key("doc::UpdateLineAction"), "charter", &[]);
        let contribution = evaluate_action(&registry, 3, &action);
        assert_eq!(contribution.index, 3);
        assert_eq!(contribution.source, RuleSource::DefaultFile("charter".into()));
        assert_eq!(contribution.rule, default);
    }

    #[test]
    fn test_resource_source_reports_generic_fallback() {
        let mut registry = PolicyRegistry::new();
        registry
            .set_rule(&PolicyTarget::Type(key("vault::SpendAction")), PolicyRule::dao_only(), DAO, 0)
            .unwrap();
        let action = ActionDescriptor::new(key("vault::SpendAction<0x2::usdc::USDC>"), vec![]);
        let contribution = evaluate_action(&registry, 0, &action);
        assert_eq!(contribution.source, RuleSource::Resource(Resolution::Generic));
    }
}
