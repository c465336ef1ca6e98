//! Point-in-time copies of the CRM lead and user collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuditLog;
use crate::broadcast::{ChangeBroadcaster, MiningEventKind};
use crate::environment::{keys, Environment};
use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub label: String,
    pub environment: Environment,
    #[serde(default)]
    pub leads: Vec<serde_json::Value>,
    #[serde(default)]
    pub users: Vec<serde_json::Value>,
}

/// Creates, lists and restores snapshots, keeping the newest `retention`.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    store: Store,
    audit: AuditLog,
    events: ChangeBroadcaster,
    retention: usize,
}

impl SnapshotManager {
    pub fn new(
        store: Store,
        audit: AuditLog,
        events: ChangeBroadcaster,
        retention: usize,
    ) -> Self {
        Self {
            store,
            audit,
            events,
            retention: retention.max(1),
        }
    }

    pub fn create_snapshot(&self, label: &str, actor: &str) -> Result<Snapshot, StoreError> {
        let snapshot = self.store.transaction(|txn| {
            let snapshot = Snapshot {
                id: uuid::Uuid::new_v4().to_string(),
                created_at: Utc::now(),
                label: label.to_string(),
                environment: txn.environment(),
                leads: txn.load(keys::CRM_LEADS)?,
                users: txn.load(keys::USERS)?,
            };

            let mut snapshots: Vec<Snapshot> = txn.load(keys::SNAPSHOTS)?;
            snapshots.insert(0, snapshot.clone());
            snapshots.truncate(self.retention);
            txn.save(keys::SNAPSHOTS, &snapshots)?;
            Ok(snapshot)
        })?;

        log::info!(
            "Created snapshot '{}' ({} leads, {} users)",
            snapshot.label,
            snapshot.leads.len(),
            snapshot.users.len()
        );
        self.audit.log_action(
            "snapshot.create",
            &snapshot.id,
            actor,
            None,
            Some(serde_json::json!({ "label": snapshot.label })),
        );
        Ok(snapshot)
    }

    /// Snapshots of the active partition, newest first.
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.store.load(keys::SNAPSHOTS)
    }

    /// Writes the snapshot's collections back. Returns `false` when no
    /// snapshot has this id.
    pub fn restore_from_snapshot(&self, id: &str, actor: &str) -> Result<bool, StoreError> {
        let restored = self.store.transaction(|txn| {
            let snapshots: Vec<Snapshot> = txn.load(keys::SNAPSHOTS)?;
            let Some(snapshot) = snapshots.into_iter().find(|s| s.id == id) else {
                return Ok(None);
            };
            txn.save(keys::CRM_LEADS, &snapshot.leads)?;
            txn.save(keys::USERS, &snapshot.users)?;
            Ok(Some(snapshot))
        })?;

        let Some(snapshot) = restored else {
            log::warn!("Snapshot {} not found, nothing restored", id);
            return Ok(false);
        };

        log::info!("Restored snapshot '{}' ({})", snapshot.label, snapshot.id);
        self.audit.log_action(
            "snapshot.restore",
            &snapshot.id,
            actor,
            None,
            Some(serde_json::json!({
                "label": snapshot.label,
                "leads": snapshot.leads.len(),
                "users": snapshot.users.len(),
            })),
        );
        self.events.send(MiningEventKind::SnapshotRestored {
            snapshot_id: snapshot.id,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager(retention: usize) -> (Store, SnapshotManager) {
        let store = Store::in_memory().unwrap();
        let audit = AuditLog::new(store.clone(), 100);
        let manager =
            SnapshotManager::new(store.clone(), audit, ChangeBroadcaster::default(), retention);
        (store, manager)
    }

    #[test]
    fn test_create_captures_collections() {
        let (store, manager) = manager(10);
        store
            .save(keys::CRM_LEADS, &[json!({"cnpj": "111"}), json!({"cnpj": "222"})])
            .unwrap();
        store.save(keys::USERS, &[json!({"name": "ana"})]).unwrap();

        let snapshot = manager.create_snapshot("before import", "ana").unwrap();
        assert_eq!(snapshot.leads.len(), 2);
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.environment, Environment::Production);
        assert_eq!(manager.list_snapshots(), vec![snapshot]);
    }

    #[test]
    fn test_retention_keeps_newest() {
        let (_store, manager) = manager(2);
        manager.create_snapshot("one", "system").unwrap();
        manager.create_snapshot("two", "system").unwrap();
        manager.create_snapshot("three", "system").unwrap();

        let labels: Vec<String> = manager
            .list_snapshots()
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["three", "two"]);
    }

    #[test]
    fn test_restore_writes_collections_back() {
        let (store, manager) = manager(10);
        store.save(keys::CRM_LEADS, &[json!({"cnpj": "111"})]).unwrap();
        let snapshot = manager.create_snapshot("baseline", "system").unwrap();

        store
            .save(keys::CRM_LEADS, &[json!({"cnpj": "111"}), json!({"cnpj": "999"})])
            .unwrap();
        store.save(keys::USERS, &[json!({"name": "intruder"})]).unwrap();

        assert!(manager.restore_from_snapshot(&snapshot.id, "system").unwrap());
        let leads: Vec<serde_json::Value> = store.load(keys::CRM_LEADS);
        let users: Vec<serde_json::Value> = store.load(keys::USERS);
        assert_eq!(leads, vec![json!({"cnpj": "111"})]);
        assert!(users.is_empty());
    }

    #[test]
    fn test_restore_unknown_snapshot() {
        let (_store, manager) = manager(10);
        assert!(!manager.restore_from_snapshot("missing", "system").unwrap());
    }

    #[test]
    fn test_restore_is_audited_and_broadcast() {
        let store = Store::in_memory().unwrap();
        let audit = AuditLog::new(store.clone(), 100);
        let events = ChangeBroadcaster::default();
        let mut rx = events.subscribe();
        let manager = SnapshotManager::new(store, audit.clone(), events, 5);

        let snapshot = manager.create_snapshot("s", "ana").unwrap();
        manager.restore_from_snapshot(&snapshot.id, "ana").unwrap();

        let actions: Vec<String> = audit.entries().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["snapshot.restore", "snapshot.create"]);
        assert_eq!(
            rx.try_recv().unwrap().kind,
            MiningEventKind::SnapshotRestored {
                snapshot_id: snapshot.id
            }
        );
    }
}
