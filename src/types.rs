//! Identifier types shared across the registry.

use alloc::format;
use alloc::string::String;
use core::fmt;
use core::str::FromStr;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PolicyError;

/// A 32-byte on-chain address: a DAO account, a council account or an object.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

/// Identifier of a registered security council.
pub type CouncilId = Address;
/// Identifier of an object that can carry its own policy.
pub type ObjectId = Address;
/// Identifier of the governed DAO account.
pub type DaoId = Address;
/// Name of a governed document.
pub type FileName = String;

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a hex address, with or without the `0x` prefix.
    ///
    /// Short forms such as `0x2` are left-padded with zeros.
    pub fn from_hex(s: &str) -> Result<Self, PolicyError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 {
            return Err(PolicyError::InvalidAddress {
                reason: format!("expected 1 to 64 hex digits, got {}", digits.len()),
            });
        }

        let mut padded = String::with_capacity(64);
        for _ in digits.len()..64 {
            padded.push('0');
        }
        padded.push_str(digits);

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|e| PolicyError::InvalidAddress {
            reason: format!("{}", e),
        })?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex encoded 32-byte address")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
                Address::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}
