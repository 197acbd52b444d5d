//! Redo scheduling: periodic re-lookup of negative entries.
//!
//! A redo is only attempted opportunistically (when a caller touches a path
//! that already has an entry, and once at startup). It runs when the store
//! holds negative entries, the cooldown since the last redo has passed, and
//! the retry flag is on. The scan keeps the store lock for its whole run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::info_store::InfoStore;
use crate::lookup::{display_name_for, InfoLookup};
use crate::lookup_pool::panic_payload_to_string;
use crate::negative_cache::{is_usable_lookup, StoredInfo};
use crate::protocol::RedoReport;
use crate::record_codec::{self, LOOKUP_RECORD_OFFSET};
use crate::state_store::ReconciliationState;

/// Default minimum time between two redo scans.
pub const DEFAULT_REDO_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Idle/Scanning state plus the gate deciding when a scan may start.
#[derive(Debug)]
pub struct RedoScheduler {
    scanning: AtomicBool,
    cooldown: Duration,
}

impl RedoScheduler {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            scanning: AtomicBool::new(false),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Evaluates the gate and, when it passes, moves to Scanning and records
    /// `now` as the last redo time. The caller must then run the scan and call
    /// [`Self::finish`].
    pub fn try_begin(
        &self,
        store: &InfoStore,
        state: &ReconciliationState,
        now_unix_ms: i64,
    ) -> bool {
        if self.is_scanning() {
            return false;
        }
        {
            let guard = store.lock();
            if !guard.has_negative_entries() {
                return false;
            }
            if !state.redo_due(now_unix_ms, self.cooldown) || !state.retry_enabled() {
                return false;
            }
        }
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Err(error) = state.mark_redo_started(now_unix_ms) {
            // Without a recorded start every later trigger would pass the gate again.
            warn!("Failed to record redo start time, skipping redo: {}", error);
            self.finish();
            return false;
        }
        true
    }

    /// Returns to Idle.
    pub fn finish(&self) {
        self.scanning.store(false, Ordering::Release);
    }
}

/// Looks up every negative entry again and upgrades those that now resolve.
///
/// Holds the store lock for the whole pass. Lookup failures, panics, and empty
/// results leave the entry negative. Syncs once at the end if anything changed.
pub fn scan_negative_entries(store: &InfoStore, lookup: &dyn InfoLookup) -> RedoReport {
    let mut guard = store.lock();
    let mut retried = 0usize;
    let upgraded = guard.rewrite_entries(|key, value| {
        if !value.is_negative() {
            return None;
        }
        retried += 1;
        let display_name = display_name_for(key);
        // A panic must not unwind through the store guard and poison it.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            lookup.lookup(Path::new(key), &display_name)
        }));
        match outcome {
            Ok(Ok(Some(fields))) if is_usable_lookup(&fields) => Some(StoredInfo::Found(
                record_codec::decode(&fields, LOOKUP_RECORD_OFFSET),
            )),
            Ok(Ok(_)) => None,
            Ok(Err(error)) => {
                warn!("Redo lookup failed for {}: {}", key, error);
                None
            }
            Err(payload) => {
                error!(
                    "Redo lookup for {} panicked: {}",
                    key,
                    panic_payload_to_string(payload.as_ref())
                );
                None
            }
        }
    });

    if upgraded > 0 {
        if let Err(error) = guard.sync() {
            warn!("Failed to sync info store after redo: {}", error);
        }
    }
    if retried > 0 {
        info!(
            "Redo pass finished: retried={} upgraded={} still_negative={}",
            retried,
            upgraded,
            guard.negative_count()
        );
    } else {
        debug!("Redo pass found no negative entries");
    }
    RedoReport { retried, upgraded }
}
