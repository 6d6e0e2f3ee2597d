//! Structured action-type identifiers.
//!
//! A `TypeKey` is a base identifier plus an ordered list of type parameters,
//! e.g. `0x1::vault::SpendAction<0x2::sui::SUI>`. The generic form of a key is
//! its base with no parameters, which is what the two-tier type lookup falls
//! back to.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PolicyError;

/// Canonical identity of an action type.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    base: String,
    params: Vec<String>,
}

impl TypeKey {
    /// A non-parameterized key.
    pub fn new(base: impl Into<String>) -> Result<Self, PolicyError> {
        let base = base.into();
        Self::parse(&base)
    }

    /// A key with explicit type parameters.
    pub fn with_params<I, S>(base: &str, params: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = Self::parse(base)?;
        if key.is_parameterized() {
            return Err(invalid(base, "base already carries type parameters"));
        }
        for param in params {
            // Parameters may themselves be generic; parse to validate and canonicalise.
            let parsed = Self::parse(param.as_ref())?;
            key.params.push(parsed.to_string());
        }
        Ok(key)
    }

    /// Parse the textual form `Base` or `Base<P1, P2, ...>`.
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        let s = s.trim();
        let (base, rest) = match s.find('<') {
            Some(idx) => (s[..idx].trim(), Some(&s[idx..])),
            None => (s, None),
        };

        if base.is_empty() {
            return Err(invalid(s, "empty base identifier"));
        }
        if base.contains('>') || base.contains(',') {
            return Err(invalid(s, "unexpected delimiter in base identifier"));
        }

        let params = match rest {
            None => Vec::new(),
            Some(rest) => split_params(s, rest)?,
        };

        Ok(Self {
            base: base.to_string(),
            params,
        })
    }

    /// The base identifier (prefix before the first `<`).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Type parameters in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }

    /// The base-only key this key falls back to.
    pub fn generic(&self) -> TypeKey {
        TypeKey {
            base: self.base.clone(),
            params: Vec::new(),
        }
    }

    /// Last `::` segment of the base, e.g. `SpendAction` for `0x1::vault::SpendAction`.
    pub fn short_name(&self) -> &str {
        self.base.rsplit("::").next().unwrap_or(&self.base)
    }
}

fn invalid(key: &str, reason: &'static str) -> PolicyError {
    PolicyError::InvalidTypeKey {
        key: key.to_string(),
        reason,
    }
}

/// Split `<A, B<C, D>>` into `["A", "B<C, D>"]`, re-canonicalising each parameter.
fn split_params(whole: &str, rest: &str) -> Result<Vec<String>, PolicyError> {
    if !rest.ends_with('>') {
        return Err(invalid(whole, "missing closing '>'"));
    }
    let inner = &rest[1..rest.len() - 1];

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => {
                if depth == 0 {
                    return Err(invalid(whole, "unbalanced '>'"));
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                params.push(canonical_param(whole, &inner[start..idx])?);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid(whole, "unbalanced '<'"));
    }
    params.push(canonical_param(whole, &inner[start..])?);

    Ok(params)
}

fn canonical_param(whole: &str, raw: &str) -> Result<String, PolicyError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid(whole, "empty type parameter"));
    }
    let parsed = TypeKey::parse(raw)?;
    Ok(parsed.to_string())
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.params.is_empty() {
            f.write_str("<")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(param)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self)
    }
}

impl FromStr for TypeKey {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TypeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TypeKeyVisitor;

        impl<'de> Visitor<'de> for TypeKeyVisitor {
            type Value = TypeKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an action type identifier")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TypeKey, E> {
                TypeKey::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TypeKeyVisitor)
    }
}
