//! Negative caching: the value stored for a path that was looked up.
//!
//! A present key holds either a real record or the negative marker. On disk the
//! marker is a SQL `NULL` in the `fields` column while records are JSON string
//! arrays, so no record (not even an all-empty one) can be mistaken for it.

use crate::protocol::{CacheEntry, InfoRecord};
use crate::record_codec::{self, LOOKUP_RECORD_OFFSET, STORE_RECORD_OFFSET};

/// Minimum number of fields in a persisted row, counting the leading path.
pub const MIN_FIELD_COUNT: usize = 6;

/// Value held by the store for a key that has been looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredInfo {
    Negative,
    Found(InfoRecord),
}

/// Why a persisted row was rejected while loading.
#[derive(Debug, thiserror::Error)]
pub enum PersistedRowError {
    #[error("row has {found} fields, expected at least {}", MIN_FIELD_COUNT)]
    TooFewFields { found: usize },
    #[error("row fields are not a JSON string array: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoredInfo {
    /// The marker for "looked up, nothing found".
    pub fn negative() -> Self {
        Self::Negative
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Negative)
    }

    /// Maps a raw lookup result to the value to store.
    ///
    /// Missing, empty, and all-blank results are negative.
    pub fn from_lookup(fields: Option<Vec<String>>) -> Self {
        match fields {
            Some(fields) if is_usable_lookup(&fields) => {
                Self::Found(record_codec::decode(&fields, LOOKUP_RECORD_OFFSET))
            }
            _ => Self::Negative,
        }
    }

    pub fn to_entry(&self) -> CacheEntry {
        match self {
            Self::Negative => CacheEntry::Negative,
            Self::Found(record) => CacheEntry::Positive(record.clone()),
        }
    }

    /// Column value for the `fields` column; `None` is the negative marker.
    pub fn to_column(&self) -> Result<Option<String>, serde_json::Error> {
        match self {
            Self::Negative => Ok(None),
            Self::Found(record) => serde_json::to_string(&record_codec::encode(record)).map(Some),
        }
    }

    /// Rebuilds a value from a persisted `(path, fields)` row.
    pub fn from_column(path: &str, column: Option<&str>) -> Result<Self, PersistedRowError> {
        let Some(column) = column else {
            return Ok(Self::Negative);
        };
        let stored: Vec<String> = serde_json::from_str(column)?;
        let mut row = Vec::with_capacity(stored.len() + 1);
        row.push(path.to_string());
        row.extend(stored);
        if row.len() < MIN_FIELD_COUNT {
            return Err(PersistedRowError::TooFewFields { found: row.len() });
        }
        Ok(Self::Found(record_codec::decode(&row, STORE_RECORD_OFFSET)))
    }
}

impl From<InfoRecord> for StoredInfo {
    fn from(record: InfoRecord) -> Self {
        Self::Found(record)
    }
}

/// Returns `true` when a lookup result carries at least one non-blank field.
pub fn is_usable_lookup(fields: &[String]) -> bool {
    fields.iter().any(|field| !field.trim().is_empty())
}
