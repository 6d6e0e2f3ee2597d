//! Proposed-action descriptors.
//!
//! The policy engine never decodes full action payloads. It only needs the
//! action's type identifier and, for a fixed set of action kinds, the object
//! or document the action targets.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::policy::type_key::TypeKey;
use crate::types::{FileName, ObjectId};

/// What kind of action a type key names, as far as policy routing cares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Targets one object; the payload starts with its 32-byte id.
    ObjectTargeted,
    /// Targets one document; the payload starts with a `u16` LE length and the UTF-8 name.
    DocumentTargeted,
    /// Spend/mint-style action parameterized by a coin type.
    CoinTyped,
    /// Custody-approval action parameterized by a capability type.
    CapabilityTyped,
    Other,
}

const OBJECT_ACTIONS: &[&str] = &[
    "WithdrawObjectAction",
    "CancelStreamAction",
    "UpdateStreamAction",
    "PauseStreamAction",
    "ResumeStreamAction",
    "UpdatePoolAction",
    "PausePoolAction",
];

const DOCUMENT_ACTIONS: &[&str] = &[
    "AddDocumentAction",
    "UpdateLineAction",
    "InsertLineAction",
    "RemoveLineAction",
    "SetLineImmutableAction",
    "SetDocumentImmutableAction",
];

const COIN_ACTIONS: &[&str] = &["SpendAction", "MintAction", "BurnAction", "WithdrawCoinAction"];

const CAPABILITY_ACTIONS: &[&str] = &["ApproveCustodyAction", "AcceptIntoCustodyAction"];

impl ActionKind {
    /// Classify by the key's short name (last `::` segment of the base).
    pub fn classify(key: &TypeKey) -> Self {
        let name = key.short_name();
        if OBJECT_ACTIONS.contains(&name) {
            ActionKind::ObjectTargeted
        } else if DOCUMENT_ACTIONS.contains(&name) {
            ActionKind::DocumentTargeted
        } else if COIN_ACTIONS.contains(&name) {
            ActionKind::CoinTyped
        } else if CAPABILITY_ACTIONS.contains(&name) {
            ActionKind::CapabilityTyped
        } else {
            ActionKind::Other
        }
    }

    pub fn is_resource_typed(&self) -> bool {
        matches!(self, ActionKind::CoinTyped | ActionKind::CapabilityTyped)
    }
}

/// One action in a proposed batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub type_key: TypeKey,
    pub payload: Vec<u8>,
}

impl ActionDescriptor {
    pub fn new(type_key: TypeKey, payload: Vec<u8>) -> Self {
        Self { type_key, payload }
    }

    /// Build an object-targeted action: `object_id || rest`.
    pub fn with_object(type_key: TypeKey, object_id: ObjectId, rest: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(32 + rest.len());
        payload.extend_from_slice(object_id.as_bytes());
        payload.extend_from_slice(rest);
        Self { type_key, payload }
    }

    /// Build a document-targeted action: `len (u16 LE) || name || rest`.
    ///
    /// Names longer than `u16::MAX` bytes are truncated at a char boundary.
    pub fn with_document(type_key: TypeKey, name: &str, rest: &[u8]) -> Self {
        let mut end = name.len().min(u16::MAX as usize);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let name = &name[..end];

        let mut payload = Vec::with_capacity(2 + name.len() + rest.len());
        payload.extend_from_slice(&(name.len() as u16).to_le_bytes());
        payload.extend_from_slice(name.as_bytes());
        payload.extend_from_slice(rest);
        Self { type_key, payload }
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::classify(&self.type_key)
    }

    /// The embedded object id, for object-targeted kinds with a long enough payload.
    pub fn object_id(&self) -> Option<ObjectId> {
        if self.kind() != ActionKind::ObjectTargeted {
            return None;
        }
        let bytes: [u8; 32] = self.payload.get(..32)?.try_into().ok()?;
        Some(ObjectId::new(bytes))
    }

    /// The embedded document name, for document-targeted kinds with a well-formed prefix.
    pub fn document_name(&self) -> Option<FileName> {
        if self.kind() != ActionKind::DocumentTargeted {
            return None;
        }
        let len_bytes: [u8; 2] = self.payload.get(..2)?.try_into().ok()?;
        let len = u16::from_le_bytes(len_bytes) as usize;
        let name = self.payload.get(2..2 + len)?;
        core::str::from_utf8(name).ok().map(|s| s.to_string())
    }

    /// The resource type parameter (coin or capability type) for resource-typed kinds.
    pub fn resource_type(&self) -> Option<String> {
        if !self.kind().is_resource_typed() {
            return None;
        }
        self.type_key.params().first().cloned()
    }
}
