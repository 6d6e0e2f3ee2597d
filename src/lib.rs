//! # DAO Policy Registry
//!
//! Approval policies for DAO governance: who must sign off before a proposed
//! batch of actions may execute, and who may change those rules.
//!
//! Each DAO owns one [`PolicyRegistry`] mapping action types, individual
//! objects and named documents to a [`PolicyRule`]. When a proposal is
//! created, [`analyze`] resolves every action's rule through the override
//! hierarchy and folds them into the single strictest [`ApprovalRequirement`].
//!
//! ## Features
//!
//! - **Override hierarchy**: object > file > parameterized type > generic type > default
//! - **Delayed changes**: rules with a change delay stage replacements instead of applying them
//! - **Meta-control**: who may change a rule is itself part of the rule
//! - **Bounded state**: fixed capacity per collection, abandoned changes can be cleaned up
//! - **`no_std` Compatible**: the registry and engine only need `alloc`
//!
//! ## Quick Start
//!
//! ```rust
//! use dao_policy_registry::{analyze, ActionDescriptor, Address, ApprovalMode};
//! use dao_policy_registry::{PolicyRegistry, PolicyRule, PolicyTarget, TypeKey};
//!
//! let dao = Address::new([1u8; 32]);
//! let treasury = Address::new([2u8; 32]);
//! let mut registry = PolicyRegistry::new();
//!
//! let spend = TypeKey::parse("vault::SpendAction").unwrap();
//! let rule = PolicyRule::execution(ApprovalMode::DaoAndCouncil, Some(treasury));
//! registry.set_rule(&PolicyTarget::Type(spend), rule, dao, 0).unwrap();
//!
//! let batch = [ActionDescriptor::new(
//!     TypeKey::parse("vault::SpendAction<0x2::sui::SUI>").unwrap(),
//!     Vec::new(),
//! )];
//! let requirement = analyze(&registry, &batch);
//! assert!(requirement.needs_dao && requirement.needs_council);
//! assert_eq!(requirement.council_id, Some(treasury));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// Module declarations
pub mod action;
pub mod config;
pub mod error;
pub mod events;
pub mod policy;
pub mod runtime;
pub mod types;

// Re-export core functionality
pub use policy::engine::{analyze, analyze_detailed, check_satisfied, RequirementReport};
pub use policy::permission::validate_change_permission;
pub use policy::registry::PolicyRegistry;
pub use runtime::{DispatchError, DispatchOutcome, GovernanceDispatcher, PolicyChangeRequest};

// Re-export types
pub use action::{ActionDescriptor, ActionKind};
pub use config::RegistryConfig;
pub use error::{PolicyError, Result};
pub use policy::types::{ApprovalMode, ApprovalRequirement, ChangeOutcome, PendingChange, PolicyRule, PolicyTarget};
pub use policy::type_key::TypeKey;
pub use types::{Address, CouncilId, DaoId, FileName, ObjectId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire value of [`ApprovalMode::DaoOnly`].
pub const MODE_DAO_ONLY: u8 = 0;
/// Wire value of [`ApprovalMode::CouncilOnly`].
pub const MODE_COUNCIL_ONLY: u8 = 1;
/// Wire value of [`ApprovalMode::DaoOrCouncil`].
pub const MODE_DAO_OR_COUNCIL: u8 = 2;
/// Wire value of [`ApprovalMode::DaoAndCouncil`].
pub const MODE_DAO_AND_COUNCIL: u8 = 3;
