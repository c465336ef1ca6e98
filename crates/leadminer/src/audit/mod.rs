//! Bounded audit trail of mutating actions.
//!
//! Writing an entry is best-effort: failures are logged and never reach the
//! operation being audited.

pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::{keys, Environment};
use crate::store::Store;

pub use snapshot::{Snapshot, SnapshotManager};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub action: String,
    pub entity_id: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    store: Store,
    cap: usize,
}

impl AuditLog {
    pub fn new(store: Store, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
        }
    }

    /// Appends an entry, evicting the oldest beyond the cap.
    pub fn log_action(
        &self,
        action: &str,
        entity_id: &str,
        actor: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) {
        let result = self.store.transaction(|txn| {
            let mut entries: Vec<AuditEntry> = txn.load(keys::AUDIT_TRAIL)?;
            entries.push(AuditEntry {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                environment: txn.environment(),
                action: action.to_string(),
                entity_id: entity_id.to_string(),
                actor: actor.to_string(),
                before,
                after,
            });
            if entries.len() > self.cap {
                let excess = entries.len() - self.cap;
                entries.drain(..excess);
            }
            txn.save(keys::AUDIT_TRAIL, &entries)
        });

        if let Err(e) = result {
            log::error!(
                "Failed to write audit entry '{}' for {}: {}",
                action,
                entity_id,
                e
            );
        }
    }

    /// Like [`log_action`](Self::log_action), serializing the states.
    pub fn log_change<T: Serialize>(
        &self,
        action: &str,
        entity_id: &str,
        actor: &str,
        before: Option<&T>,
        after: Option<&T>,
    ) {
        let before = before.and_then(|b| serde_json::to_value(b).ok());
        let after = after.and_then(|a| serde_json::to_value(a).ok());
        self.log_action(action, entity_id, actor, before, after);
    }

    /// Entries of the active partition, newest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self.store.load(keys::AUDIT_TRAIL);
        entries.reverse();
        entries
    }
}
