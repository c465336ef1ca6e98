//! Key-value repository: JSON documents in the `kv_store` table.
//!
//! Functions take a `Connection` rather than a `Database` so they compose
//! inside [`Database::with_transaction`](super::Database::with_transaction).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw document row from the database.
#[derive(Debug, Clone)]
pub struct KvRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl KvRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Finds a document by key.
pub fn get(conn: &Connection, key: &str) -> Result<Option<KvRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT key, value, updated_at FROM kv_store WHERE key = ?1",
            params![key],
            KvRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Inserts or replaces a document.
pub fn put(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_put_and_get() {
        let db = test_db();
        db.with_conn(|conn| {
            put(conn, "jobs", "[]")?;
            let row = get(conn, "jobs")?.unwrap();
            assert_eq!(row.key, "jobs");
            assert_eq!(row.value, "[]");
            assert!(!row.updated_at.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_get_missing() {
        let db = test_db();
        let row = db.with_conn(|conn| get(conn, "nope")).unwrap();
        assert!(row.is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let db = test_db();
        db.with_conn(|conn| {
            put(conn, "leads", "[1]")?;
            put(conn, "leads", "[1,2]")?;
            let row = get(conn, "leads")?.unwrap();
            assert_eq!(row.value, "[1,2]");
            Ok(())
        })
        .unwrap();
    }
}
