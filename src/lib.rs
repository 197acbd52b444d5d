//! Negative-aware media info cache.
//!
//! [`InfoDb`] maps absolute file paths to catalog records fetched from a remote
//! lookup service. Paths the service knows nothing about are cached as negative
//! entries so they are not looked up again on every access; a periodic redo pass
//! re-tries them once the cooldown has elapsed.

pub mod clock;
pub mod config;
pub mod error;
pub mod info_db;
pub mod info_store;
pub mod lookup;
pub mod lookup_pool;
pub mod negative_cache;
pub mod protocol;
pub mod record_codec;
pub mod redo;
pub mod state_store;

#[cfg(test)]
mod test_support;

pub use error::{InfoDbError, InfoDbResult, LookupError};
pub use info_db::{InfoDb, InfoDbOptions, InfoDbStats};
pub use info_store::InfoStore;
pub use lookup::InfoLookup;
pub use protocol::{AddOutcome, CacheEntry, InfoMessage, InfoRecord, RedoReport};
