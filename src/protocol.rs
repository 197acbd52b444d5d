//! Shared cache payloads and the event-bus protocol.
//!
//! These types are exchanged between the store, the lookup workers, the redo
//! scheduler, and anyone subscribed to cache events.

/// Metadata known for one media file.
///
/// Every field is free-form text; a missing value is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct InfoRecord {
    /// External catalog identifier (for example an IMDb id).
    pub catalog_id: String,
    pub episode_name: String,
    pub title: String,
    pub season: String,
    pub episode: String,
    pub year: String,
}

/// Result of reading one path from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Never looked up.
    Absent,
    /// Looked up, nothing usable was found.
    Negative,
    /// Looked up and found.
    Positive(InfoRecord),
}

impl CacheEntry {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Negative)
    }

    /// Returns the record for positive entries.
    pub fn record(&self) -> Option<&InfoRecord> {
        match self {
            Self::Positive(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<InfoRecord> {
        match self {
            Self::Positive(record) => Some(record),
            _ => None,
        }
    }
}

/// What `background_add` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A lookup job was queued for a worker.
    Queued,
    /// The path already has an entry; no lookup was queued.
    AlreadyCached,
    /// The lookup queue is full; the path stays absent and may be re-added later.
    QueueFull,
}

/// Counters for one completed redo scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedoReport {
    /// Negative entries that were looked up again.
    pub retried: usize,
    /// Entries upgraded from negative to positive.
    pub upgraded: usize,
}

/// Notifications published on the cache bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoMessage {
    /// A background lookup stored a value for a previously absent path.
    EntryStored { path: String, entry: CacheEntry },
    /// A background lookup failed; nothing was stored.
    LookupFailed { path: String, reason: String },
    /// A redo scan passed its gate and was launched.
    RedoStarted,
    /// A redo scan completed.
    RedoFinished(RedoReport),
    /// An entry was moved to a new path.
    EntryMoved { from: String, to: String },
}
