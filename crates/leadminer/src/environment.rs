//! Runtime-selectable data partition.
//!
//! Every storage key used by the engine goes through [`scoped_key`], so the
//! same code runs against isolated production and staging partitions.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Prefix applied to every key in the staging partition.
pub const STAGING_PREFIX: &str = "staging_";

/// Base keys of the collections stored per partition.
pub mod keys {
    pub const JOBS: &str = "jobs";
    pub const LEADS: &str = "leads";
    /// Main CRM leads. Read-only from the engine's point of view.
    pub const CRM_LEADS: &str = "crm_leads";
    pub const USERS: &str = "users";
    pub const AUDIT_TRAIL: &str = "audit_trail";
    pub const SNAPSHOTS: &str = "snapshots";
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaces `base` for the given environment.
pub fn scoped_key(environment: Environment, base: &str) -> String {
    match environment {
        Environment::Production => base.to_string(),
        Environment::Staging => format!("{}{}", STAGING_PREFIX, base),
    }
}

/// Shared handle to the process-wide environment flag.
///
/// Cloning is cheap; all clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentHandle {
    current: Arc<RwLock<Environment>>,
}

impl EnvironmentHandle {
    pub fn new(environment: Environment) -> Self {
        Self {
            current: Arc::new(RwLock::new(environment)),
        }
    }

    pub fn get(&self) -> Environment {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                log::warn!("Environment lock was poisoned, recovering");
                *poisoned.into_inner()
            }
        }
    }

    /// Replaces the active environment, returning the previous one.
    pub fn set(&self, environment: Environment) -> Environment {
        let mut guard = match self.current.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Environment lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        std::mem::replace(&mut *guard, environment)
    }

    /// Namespaces `base` for the active environment.
    pub fn scoped_key(&self, base: &str) -> String {
        scoped_key(self.get(), base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_keys_are_unprefixed() {
        assert_eq!(scoped_key(Environment::Production, keys::JOBS), "jobs");
        assert_eq!(scoped_key(Environment::Production, keys::LEADS), "leads");
    }

    #[test]
    fn test_staging_keys_are_prefixed() {
        assert_eq!(scoped_key(Environment::Staging, keys::JOBS), "staging_jobs");
        assert_eq!(
            scoped_key(Environment::Staging, keys::AUDIT_TRAIL),
            "staging_audit_trail"
        );
    }

    #[test]
    fn test_handle_is_shared_between_clones() {
        let handle = EnvironmentHandle::default();
        let other = handle.clone();
        assert_eq!(handle.get(), Environment::Production);

        let previous = other.set(Environment::Staging);
        assert_eq!(previous, Environment::Production);
        assert_eq!(handle.get(), Environment::Staging);
        assert_eq!(handle.scoped_key(keys::CRM_LEADS), "staging_crm_leads");
    }

    #[test]
    fn test_environment_serde() {
        let json = serde_json::to_string(&Environment::Staging).unwrap();
        assert_eq!(json, "\"staging\"");
        let parsed: Environment = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(parsed, Environment::Production);
    }
}
