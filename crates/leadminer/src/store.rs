//! Environment-scoped collection store.
//!
//! Collections are stored as whole JSON arrays under a scoped key. Reads fail
//! open: a missing document or a document that is not an array is treated as
//! empty and logged. An element that does not deserialize is left out of the
//! typed result, logged at error level, and written back unchanged when the
//! same transaction rewrites its collection.

use std::cell::RefCell;
use std::collections::HashMap;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::{kv_repo, Database};
use crate::environment::{scoped_key, Environment, EnvironmentHandle};
use crate::error::StoreError;

/// Typed access to the per-environment collections.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
    environment: EnvironmentHandle,
}

impl Store {
    pub fn new(db: Database, environment: EnvironmentHandle) -> Self {
        Self { db, environment }
    }

    /// Opens an in-memory store in the production partition.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(
            Database::open_in_memory()?,
            EnvironmentHandle::default(),
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn environment(&self) -> &EnvironmentHandle {
        &self.environment
    }

    /// Loads a collection from the active partition.
    pub fn load<T: DeserializeOwned>(&self, base_key: &str) -> Vec<T> {
        let environment = self.environment.get();
        let key = scoped_key(environment, base_key);
        match self.db.with_conn(|conn| kv_repo::get(conn, &key)) {
            Ok(row) => decode_collection(&key, row.map(|r| r.value).as_deref()).0,
            Err(e) => {
                log::warn!("Failed to read collection '{}', treating as empty: {}", key, e);
                Vec::new()
            }
        }
    }

    /// Replaces a collection in the active partition.
    pub fn save<T: Serialize>(&self, base_key: &str, items: &[T]) -> Result<(), StoreError> {
        self.transaction(|txn| txn.save(base_key, items))
    }

    /// Runs a read-modify-write cycle atomically.
    ///
    /// The environment is captured once, so a concurrent environment switch
    /// cannot split a transaction across partitions.
    pub fn transaction<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&StoreTxn<'_>) -> Result<R, StoreError>,
    {
        let environment = self.environment.get();
        self.db.with_transaction(|conn| {
            let txn = StoreTxn {
                conn,
                environment,
                unreadable: RefCell::new(HashMap::new()),
            };
            f(&txn)
        })
    }
}

/// Collection access bound to one open transaction.
pub struct StoreTxn<'a> {
    conn: &'a Connection,
    environment: Environment,
    /// Raw elements that failed to decode, by scoped key.
    unreadable: RefCell<HashMap<String, Vec<Value>>>,
}

impl StoreTxn<'_> {
    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn load<T: DeserializeOwned>(&self, base_key: &str) -> Result<Vec<T>, StoreError> {
        let key = scoped_key(self.environment, base_key);
        let row = kv_repo::get(self.conn, &key)?;
        let (items, unreadable) = decode_collection(&key, row.map(|r| r.value).as_deref());
        if unreadable.is_empty() {
            self.unreadable.borrow_mut().remove(&key);
        } else {
            self.unreadable.borrow_mut().insert(key, unreadable);
        }
        Ok(items)
    }

    /// Replaces a collection. Elements of it that an earlier `load` in this
    /// transaction could not decode are appended as they were.
    pub fn save<T: Serialize>(&self, base_key: &str, items: &[T]) -> Result<(), StoreError> {
        let key = scoped_key(self.environment, base_key);
        let serialize_error = |e| StoreError::Serialize {
            key: key.clone(),
            source: e,
        };

        let json = match self.unreadable.borrow().get(&key) {
            Some(kept) => {
                let mut elements = Vec::with_capacity(items.len() + kept.len());
                for item in items {
                    elements.push(serde_json::to_value(item).map_err(serialize_error)?);
                }
                elements.extend(kept.iter().cloned());
                serde_json::to_string(&elements).map_err(serialize_error)?
            }
            None => serde_json::to_string(items).map_err(serialize_error)?,
        };
        kv_repo::put(self.conn, &key, &json)?;
        Ok(())
    }
}

/// Decodes a stored collection into typed items and the raw elements that
/// did not fit `T`.
fn decode_collection<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> (Vec<T>, Vec<Value>) {
    let Some(raw) = raw else {
        return (Vec::new(), Vec::new());
    };

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Collection '{}' is not valid JSON, treating as empty: {}", key, e);
            return (Vec::new(), Vec::new());
        }
    };

    let Value::Array(elements) = value else {
        log::warn!("Collection '{}' is not an array, treating as empty", key);
        return (Vec::new(), Vec::new());
    };

    let mut items = Vec::with_capacity(elements.len());
    let mut unreadable = Vec::new();
    for (index, element) in elements.into_iter().enumerate() {
        match T::deserialize(&element) {
            Ok(item) => items.push(item),
            Err(e) => {
                log::error!(
                    "Cannot decode element {} of '{}', leaving it untouched: {}",
                    index,
                    key,
                    e
                );
                unreadable.push(element);
            }
        }
    }
    (items, unreadable)
}
