//! Process-wide key/value state used by the redo scheduler.
//!
//! The last-redo timestamp and the retry flag live here rather than in the
//! cache itself. [`TomlStateStore`] edits its file with `toml_edit` so comments
//! and formatting written by hand survive updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::warn;
use toml_edit::{value, DocumentMut, Item, Table, Value};

use crate::error::{InfoDbError, InfoDbResult};

/// Key holding the unix-millis timestamp of the last redo scan.
pub const LAST_INFO_REREAD_KEY: &str = "last_info_reread";
/// Key holding the retry feature flag.
pub const INFO_DB_RETRY_KEY: &str = "info_db_retry";

/// String key/value store shared across the process.
pub trait StateStore: Send + Sync {
    fn get_value(&self, key: &str) -> Option<String>;
    fn set_value(&self, key: &str, value: &str) -> InfoDbResult<()>;
}

/// Volatile [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get_value(&self, key: &str) -> Option<String> {
        let values = self.values.lock().expect("state store lock poisoned");
        values.get(key).cloned()
    }

    fn set_value(&self, key: &str, value: &str) -> InfoDbResult<()> {
        let mut values = self.values.lock().expect("state store lock poisoned");
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// [`StateStore`] persisted as a flat TOML document.
pub struct TomlStateStore {
    path: PathBuf,
    document: Mutex<DocumentMut>,
}

impl TomlStateStore {
    /// Default state file under the user data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("infodb").join("state.toml"))
    }

    /// Loads `path`, starting from an empty document when it does not exist.
    pub fn open(path: &Path) -> InfoDbResult<Self> {
        let document = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            content.parse::<DocumentMut>().map_err(|error| {
                InfoDbError::State(format!("failed to parse {}: {error}", path.display()))
            })?
        } else {
            DocumentMut::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            document: Mutex::new(document),
        })
    }

    fn write_document(&self, document: &DocumentMut) -> InfoDbResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, document.to_string())?;
        Ok(())
    }
}

fn item_as_string(item: &Item) -> Option<String> {
    match item.as_value()? {
        Value::String(text) => Some(text.value().clone()),
        Value::Integer(number) => Some(number.value().to_string()),
        Value::Boolean(flag) => Some(flag.value().to_string()),
        Value::Float(number) => Some(number.value().to_string()),
        _ => None,
    }
}

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

impl StateStore for TomlStateStore {
    fn get_value(&self, key: &str) -> Option<String> {
        let document = self.document.lock().expect("state document lock poisoned");
        document.get(key).and_then(item_as_string)
    }

    fn set_value(&self, key: &str, next: &str) -> InfoDbResult<()> {
        let mut document = self.document.lock().expect("state document lock poisoned");
        if document.get(key).and_then(item_as_string).as_deref() == Some(next) {
            return Ok(());
        }
        set_table_value_preserving_decor(document.as_table_mut(), key, value(next));
        self.write_document(&document)
    }
}

/// Typed view over the redo-related keys of a [`StateStore`].
#[derive(Clone)]
pub struct ReconciliationState {
    store: Arc<dyn StateStore>,
}

impl ReconciliationState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Records `now` as the last redo time when no value has ever been stored.
    pub fn ensure_initialized(&self, now_unix_ms: i64) -> InfoDbResult<()> {
        if self.store.get_value(LAST_INFO_REREAD_KEY).is_none() {
            self.store
                .set_value(LAST_INFO_REREAD_KEY, &now_unix_ms.to_string())?;
        }
        Ok(())
    }

    /// Last redo time. A missing or malformed value reads as `now`, which defers
    /// the next redo by a full cooldown.
    pub fn last_redo_unix_ms(&self, now_unix_ms: i64) -> i64 {
        let Some(raw) = self.store.get_value(LAST_INFO_REREAD_KEY) else {
            return now_unix_ms;
        };
        match raw.trim().parse::<i64>() {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(
                    "Ignoring malformed {} value '{}': {}",
                    LAST_INFO_REREAD_KEY, raw, error
                );
                now_unix_ms
            }
        }
    }

    /// Returns `true` once strictly more than `cooldown` has passed since the last redo.
    pub fn redo_due(&self, now_unix_ms: i64, cooldown: Duration) -> bool {
        let elapsed = now_unix_ms.saturating_sub(self.last_redo_unix_ms(now_unix_ms));
        elapsed > cooldown.as_millis() as i64
    }

    pub fn mark_redo_started(&self, now_unix_ms: i64) -> InfoDbResult<()> {
        self.store
            .set_value(LAST_INFO_REREAD_KEY, &now_unix_ms.to_string())
    }

    pub fn retry_enabled(&self) -> bool {
        self.store
            .get_value(INFO_DB_RETRY_KEY)
            .is_some_and(|raw| parse_flag(&raw))
    }

    pub fn set_retry_enabled(&self, enabled: bool) -> InfoDbResult<()> {
        self.store
            .set_value(INFO_DB_RETRY_KEY, if enabled { "true" } else { "false" })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
