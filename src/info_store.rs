//! SQLite-backed store for looked-up media info.
//!
//! The whole table is mirrored in an ordered in-memory index so reads never
//! touch disk. Every read and write goes through [`InfoStore::lock`], which
//! hands out the single store-wide guard.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use rusqlite::{params, Connection};

use crate::error::InfoDbResult;
use crate::negative_cache::StoredInfo;
use crate::protocol::CacheEntry;

/// File name of the persisted store.
pub const STORE_FILE_NAME: &str = "InfoDb.db";

/// Whether a mutation is written to SQLite right away or on the next [`InfoStoreGuard::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Immediate,
    Deferred,
}

struct StoreInner {
    conn: Connection,
    entries: BTreeMap<String, StoredInfo>,
    negative_count: usize,
    // `None` marks a deferred delete.
    pending: BTreeMap<String, Option<StoredInfo>>,
}

/// Persistent path -> [`StoredInfo`] map guarded by one exclusive lock.
pub struct InfoStore {
    inner: Mutex<StoreInner>,
}

/// Exclusive access to the store. Drop it to release the lock.
pub struct InfoStoreGuard<'a> {
    inner: MutexGuard<'a, StoreInner>,
}

impl InfoStore {
    /// Default on-disk location under the user data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("infodb").join(STORE_FILE_NAME))
    }

    /// Opens (or creates) the store at `path` and loads every valid row.
    pub fn open(path: &Path) -> InfoDbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        debug!(
            "Opened info store at {} ({} entries)",
            path.display(),
            store.lock().len()
        );
        Ok(store)
    }

    pub fn new_in_memory() -> InfoDbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> InfoDbResult<Self> {
        initialize_schema(&conn)?;
        let entries = load_entries(&conn)?;
        let negative_count = entries.values().filter(|value| value.is_negative()).count();
        Ok(Self {
            inner: Mutex::new(StoreInner {
                conn,
                entries,
                negative_count,
                pending: BTreeMap::new(),
            }),
        })
    }

    /// Takes the store-wide lock.
    pub fn lock(&self) -> InfoStoreGuard<'_> {
        InfoStoreGuard {
            inner: self.inner.lock().expect("info store lock poisoned"),
        }
    }
}

fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS info (
            path TEXT PRIMARY KEY,
            fields TEXT
        )",
        [],
    )?;
    Ok(())
}

fn load_entries(conn: &Connection) -> Result<BTreeMap<String, StoredInfo>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT path, fields FROM info")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut entries = BTreeMap::new();
    for row in rows {
        let (path, fields) = row?;
        match StoredInfo::from_column(&path, fields.as_deref()) {
            Ok(value) => {
                entries.insert(path, value);
            }
            Err(error) => warn!("Skipping invalid info row for {}: {}", path, error),
        }
    }
    Ok(entries)
}

fn write_row(conn: &Connection, path: &str, value: &StoredInfo) -> InfoDbResult<()> {
    conn.execute(
        "INSERT INTO info (path, fields) VALUES (?1, ?2)
         ON CONFLICT(path) DO UPDATE SET fields = excluded.fields",
        params![path, value.to_column()?],
    )?;
    Ok(())
}

fn delete_row(conn: &Connection, path: &str) -> InfoDbResult<()> {
    conn.execute("DELETE FROM info WHERE path = ?1", params![path])?;
    Ok(())
}

impl InfoStoreGuard<'_> {
    pub fn get(&self, key: &str) -> CacheEntry {
        self.inner
            .entries
            .get(key)
            .map(StoredInfo::to_entry)
            .unwrap_or(CacheEntry::Absent)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn negative_count(&self) -> usize {
        self.inner.negative_count
    }

    pub fn has_negative_entries(&self) -> bool {
        self.inner.negative_count > 0
    }

    /// Number of mutations waiting for [`Self::sync`].
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Inserts or overwrites `key`. An immediate write that fails leaves the
    /// index untouched.
    pub fn put(&mut self, key: &str, value: StoredInfo, mode: SyncMode) -> InfoDbResult<()> {
        let inner = &mut *self.inner;
        match mode {
            SyncMode::Immediate => {
                write_row(&inner.conn, key, &value)?;
                inner.pending.remove(key);
            }
            SyncMode::Deferred => {
                inner.pending.insert(key.to_string(), Some(value.clone()));
            }
        }
        if value.is_negative() {
            inner.negative_count += 1;
        }
        if let Some(previous) = inner.entries.insert(key.to_string(), value) {
            if previous.is_negative() {
                inner.negative_count -= 1;
            }
        }
        Ok(())
    }

    /// Removes `key`, returning its previous value. An immediate delete that
    /// fails leaves the index untouched.
    pub fn remove(&mut self, key: &str, mode: SyncMode) -> InfoDbResult<Option<StoredInfo>> {
        let inner = &mut *self.inner;
        if !inner.entries.contains_key(key) {
            return Ok(None);
        }
        match mode {
            SyncMode::Immediate => {
                delete_row(&inner.conn, key)?;
                inner.pending.remove(key);
            }
            SyncMode::Deferred => {
                inner.pending.insert(key.to_string(), None);
            }
        }
        let previous = inner.entries.remove(key);
        if previous.as_ref().is_some_and(StoredInfo::is_negative) {
            inner.negative_count -= 1;
        }
        Ok(previous)
    }

    /// Moves the value at `old_key` to `new_key` and syncs. Returns `false` when
    /// `old_key` has no entry. A failed sync keeps the move pending for the next
    /// [`Self::sync`].
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> InfoDbResult<bool> {
        if old_key == new_key {
            return Ok(self.contains(old_key));
        }
        let Some(value) = self.remove(old_key, SyncMode::Deferred)? else {
            return Ok(false);
        };
        self.put(new_key, value, SyncMode::Deferred)?;
        self.sync()?;
        Ok(true)
    }

    /// Visits every entry in key order. When `rewrite` returns a value it
    /// replaces the entry in place; replacements are deferred until
    /// [`Self::sync`]. Returns the number of replaced entries.
    pub fn rewrite_entries<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(&str, &StoredInfo) -> Option<StoredInfo>,
    {
        let inner = &mut *self.inner;
        let mut replaced = 0usize;
        for (key, value) in inner.entries.iter_mut() {
            let Some(next) = rewrite(key.as_str(), &*value) else {
                continue;
            };
            if value.is_negative() {
                inner.negative_count -= 1;
            }
            if next.is_negative() {
                inner.negative_count += 1;
            }
            *value = next.clone();
            inner.pending.insert(key.clone(), Some(next));
            replaced += 1;
        }
        replaced
    }

    /// Writes all deferred mutations in one transaction. Returns how many rows
    /// were flushed.
    pub fn sync(&mut self) -> InfoDbResult<usize> {
        let inner = &mut *self.inner;
        if inner.pending.is_empty() {
            return Ok(0);
        }
        let tx = inner.conn.transaction()?;
        for (key, value) in &inner.pending {
            match value {
                Some(value) => write_row(&tx, key, value)?,
                None => delete_row(&tx, key)?,
            }
        }
        tx.commit()?;
        let flushed = inner.pending.len();
        inner.pending.clear();
        Ok(flushed)
    }
}
