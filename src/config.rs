//! Registry configuration.
//!
//! Defaults are the protocol ceilings. A deployment may lower them (tests
//! usually do, to exercise capacity paths cheaply) but never raise them.

use alloc::format;
use alloc::string::ToString;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Maximum number of action-type rules per registry.
pub const MAX_TYPE_RULES: usize = 200;
/// Maximum number of object rules per registry.
pub const MAX_OBJECT_RULES: usize = 100;
/// Maximum number of file rules per registry.
pub const MAX_FILE_RULES: usize = 100;
/// Maximum number of registered councils per registry.
pub const MAX_COUNCILS: usize = 20;
/// Pending changes proposed longer ago than this are abandoned (30 days).
pub const ABANDONMENT_THRESHOLD_MS: u64 = 2_592_000_000;

/// Capacity ceilings and cleanup threshold for one registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_type_rules: usize,
    pub max_object_rules: usize,
    pub max_file_rules: usize,
    pub max_councils: usize,
    pub abandonment_threshold_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_type_rules: MAX_TYPE_RULES,
            max_object_rules: MAX_OBJECT_RULES,
            max_file_rules: MAX_FILE_RULES,
            max_councils: MAX_COUNCILS,
            abandonment_threshold_ms: ABANDONMENT_THRESHOLD_MS,
        }
    }
}

impl RegistryConfig {
    /// Reject zero ceilings and ceilings above the protocol limits.
    pub fn validate(&self) -> Result<(), PolicyError> {
        check_ceiling("max_type_rules", self.max_type_rules, MAX_TYPE_RULES)?;
        check_ceiling("max_object_rules", self.max_object_rules, MAX_OBJECT_RULES)?;
        check_ceiling("max_file_rules", self.max_file_rules, MAX_FILE_RULES)?;
        check_ceiling("max_councils", self.max_councils, MAX_COUNCILS)?;
        if self.abandonment_threshold_ms == 0 {
            return Err(PolicyError::InvalidConfig {
                reason: "abandonment_threshold_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let config: RegistryConfig =
            serde_json::from_str(json).map_err(|e| PolicyError::InvalidConfig {
                reason: format!("{}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from `POLICY_REGISTRY_*` environment variables.
    #[cfg(feature = "std")]
    pub fn from_env() -> Result<Self, PolicyError> {
        let mut config = Self::default();
        if let Some(v) = env_override("POLICY_REGISTRY_MAX_TYPE_RULES")? {
            config.max_type_rules = v;
        }
        if let Some(v) = env_override("POLICY_REGISTRY_MAX_OBJECT_RULES")? {
            config.max_object_rules = v;
        }
        if let Some(v) = env_override("POLICY_REGISTRY_MAX_FILE_RULES")? {
            config.max_file_rules = v;
        }
        if let Some(v) = env_override("POLICY_REGISTRY_MAX_COUNCILS")? {
            config.max_councils = v;
        }
        if let Some(v) = env_override("POLICY_REGISTRY_ABANDON_AFTER_MS")? {
            config.abandonment_threshold_ms = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn check_ceiling(name: &str, value: usize, limit: usize) -> Result<(), PolicyError> {
    if value == 0 || value > limit {
        return Err(PolicyError::InvalidConfig {
            reason: format!("{} must be in 1..={}, got {}", name, limit, value),
        });
    }
    Ok(())
}

#[cfg(feature = "std")]
fn env_override<T>(var: &str) -> Result<Option<T>, PolicyError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => parse_override(var, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

/// Parse straight into the target width so out-of-range values are rejected, not truncated.
#[cfg(feature = "std")]
fn parse_override<T>(var: &str, raw: &str) -> Result<T, PolicyError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| PolicyError::InvalidConfig {
        reason: format!("{}: {}", var, e),
    })
}
