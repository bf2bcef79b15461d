//! Durable local cache: a small SQLite key/value table.
//!
//! Keys:
//! - `lab:<id>:steps` - JSON array of completed step ids, ascending
//! - `snapshot` - JSON [`ProgressSnapshot`] mirror for offline fallback
//! - `identity` - JSON [`Identity`] of the signed-in learner
//!
//! A value that fails to decode reads as absent.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Identity, ProgressSnapshot};

const SNAPSHOT_KEY: &str = "snapshot";
const IDENTITY_KEY: &str = "identity";
const LAB_KEY_PREFIX: &str = "lab:";

pub fn lab_key(lab_id: u32) -> String {
    format!("{}{}:steps", LAB_KEY_PREFIX, lab_id)
}

pub struct LocalCache {
    conn: Arc<Mutex<Connection>>,
}

impl LocalCache {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open local cache at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .context("Failed to create local_state table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ============================================================
    // Raw key/value access
    // ============================================================

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn.lock().expect("local cache lock poisoned");
        let raw: Option<String> = conn
            .query_row("SELECT value FROM local_state WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "ignoring malformed local value: {}", e);
                None
            }
        }))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn.lock().expect("local cache lock poisoned");
        conn.execute(
            "INSERT INTO local_state (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, &json, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("local cache lock poisoned");
        conn.execute("DELETE FROM local_state WHERE key = ?", [key])?;
        Ok(())
    }

    /// Raw write, bypassing serialization. Lets tests plant corrupt values.
    #[cfg(test)]
    fn set_raw(&self, key: &str, raw: &str) -> Result<()> {
        let conn = self.conn.lock().expect("local cache lock poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO local_state (key, value, updated_at) VALUES (?, ?, ?)",
            (key, raw, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    // ============================================================
    // Typed keys
    // ============================================================

    pub fn lab_steps(&self, lab_id: u32) -> Result<Option<Vec<u32>>> {
        self.get(&lab_key(lab_id))
    }

    pub fn set_lab_steps(&self, lab_id: u32, steps: &[u32]) -> Result<()> {
        self.set(&lab_key(lab_id), &steps)
    }

    pub fn snapshot(&self) -> Result<Option<ProgressSnapshot>> {
        self.get(SNAPSHOT_KEY)
    }

    pub fn set_snapshot(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        self.set(SNAPSHOT_KEY, snapshot)
    }

    pub fn identity(&self) -> Result<Option<Identity>> {
        self.get(IDENTITY_KEY)
    }

    pub fn set_identity(&self, identity: Option<&Identity>) -> Result<()> {
        match identity {
            Some(identity) => self.set(IDENTITY_KEY, identity),
            None => self.remove(IDENTITY_KEY),
        }
    }

    /// Drop every per-lab key and the snapshot mirror.
    pub fn clear_progress(&self) -> Result<()> {
        let conn = self.conn.lock().expect("local cache lock poisoned");
        conn.execute(
            "DELETE FROM local_state WHERE key = ? OR key LIKE ?",
            (SNAPSHOT_KEY, format!("{}%", LAB_KEY_PREFIX)),
        )?;
        Ok(())
    }
}

impl Clone for LocalCache {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_steps_round_trip_through_json() {
        let cache = LocalCache::open_memory().unwrap();
        assert_eq!(cache.lab_steps(2).unwrap(), None);

        cache.set_lab_steps(2, &[1, 4]).unwrap();
        assert_eq!(cache.lab_steps(2).unwrap(), Some(vec![1, 4]));
    }

    #[test]
    fn malformed_values_read_as_absent() {
        let cache = LocalCache::open_memory().unwrap();
        cache.set_raw(&lab_key(1), "not json").unwrap();
        cache.set_raw(SNAPSHOT_KEY, "{\"progress\": 7}").unwrap();

        assert_eq!(cache.lab_steps(1).unwrap(), None);
        assert_eq!(cache.snapshot().unwrap(), None);
    }

    #[test]
    fn clear_progress_keeps_identity() {
        let cache = LocalCache::open_memory().unwrap();
        let identity = Identity {
            token: "t".into(),
            username: "nour".into(),
        };
        cache.set_identity(Some(&identity)).unwrap();
        cache.set_lab_steps(1, &[1]).unwrap();
        cache.set_snapshot(&ProgressSnapshot::default()).unwrap();

        cache.clear_progress().unwrap();

        assert_eq!(cache.lab_steps(1).unwrap(), None);
        assert_eq!(cache.snapshot().unwrap(), None);
        assert_eq!(cache.identity().unwrap(), Some(identity));

        cache.set_identity(None).unwrap();
        assert_eq!(cache.identity().unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local.db");

        LocalCache::open(path.clone())
            .unwrap()
            .set_lab_steps(3, &[2])
            .unwrap();

        let reopened = LocalCache::open(path).unwrap();
        assert_eq!(reopened.lab_steps(3).unwrap(), Some(vec![2]));
    }
}
