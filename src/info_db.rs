//! Media info cache runtime component.
//!
//! `InfoDb` answers path lookups straight from the store, queues remote
//! lookups for paths it has never seen, and opportunistically re-tries paths
//! whose earlier lookup found nothing.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::clock::Clock;
use crate::config::InfoDbConfig;
use crate::error::InfoDbResult;
use crate::info_store::{InfoStore, SyncMode};
use crate::lookup::InfoLookup;
use crate::lookup_pool::{LookupJob, LookupPool, SubmitError};
use crate::negative_cache::StoredInfo;
use crate::protocol::{AddOutcome, CacheEntry, InfoMessage, InfoRecord};
use crate::redo::{self, RedoScheduler, DEFAULT_REDO_COOLDOWN};
use crate::state_store::{ReconciliationState, StateStore};

const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Tuning for [`InfoDb::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoDbOptions {
    pub redo_cooldown: Duration,
    pub lookup_workers: usize,
    pub lookup_queue_capacity: usize,
    pub bus_capacity: usize,
}

impl Default for InfoDbOptions {
    fn default() -> Self {
        Self {
            redo_cooldown: DEFAULT_REDO_COOLDOWN,
            lookup_workers: 4,
            lookup_queue_capacity: 256,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl From<&InfoDbConfig> for InfoDbOptions {
    fn from(config: &InfoDbConfig) -> Self {
        Self {
            redo_cooldown: config.redo_cooldown(),
            lookup_workers: config.lookup_workers,
            lookup_queue_capacity: config.lookup_queue_capacity,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoDbStats {
    pub entries: usize,
    pub negative_entries: usize,
    pub redo_running: bool,
}

struct Shared {
    store: InfoStore,
    lookup: Arc<dyn InfoLookup>,
    state: ReconciliationState,
    clock: Arc<dyn Clock>,
    redo: RedoScheduler,
    bus_producer: Sender<InfoMessage>,
}

/// Negative-aware cache of media info keyed by absolute file path.
pub struct InfoDb {
    lookup_pool: LookupPool,
    shared: Arc<Shared>,
}

fn cache_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

impl Shared {
    fn emit(&self, message: InfoMessage) {
        let _ = self.bus_producer.send(message);
    }

    /// Runs one queued lookup and stores its outcome. Failures store nothing.
    fn populate(&self, job: LookupJob) {
        let LookupJob { path, display_name } = job;
        let fields = match self.lookup.lookup(Path::new(&path), &display_name) {
            Ok(fields) => fields,
            Err(error) => {
                warn!("Info lookup failed for {}: {}", path, error);
                self.emit(InfoMessage::LookupFailed {
                    path,
                    reason: error.to_string(),
                });
                return;
            }
        };

        let value = StoredInfo::from_lookup(fields);
        let entry = {
            let mut guard = self.store.lock();
            let current = guard.get(&path);
            if value.is_negative() && matches!(current, CacheEntry::Positive(_)) {
                // A concurrent lookup for the same path already found a record.
                debug!("Keeping existing record for {}", path);
                current
            } else {
                if let Err(error) = guard.put(&path, value, SyncMode::Immediate) {
                    error!("Failed to store info for {}: {}", path, error);
                    return;
                }
                guard.get(&path)
            }
        };
        debug!("Stored info for {}: {:?}", path, entry);
        self.emit(InfoMessage::EntryStored { path, entry });
    }

    fn trigger_redo(shared: &Arc<Self>) -> bool {
        let now = shared.clock.now_unix_ms();
        if !shared.redo.try_begin(&shared.store, &shared.state, now) {
            return false;
        }
        info!("Starting info redo pass");
        shared.emit(InfoMessage::RedoStarted);

        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("infodb-redo".to_string())
            .spawn(move || {
                let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    redo::scan_negative_entries(&worker.store, worker.lookup.as_ref())
                }));
                worker.redo.finish();
                match run_result {
                    Ok(report) => worker.emit(InfoMessage::RedoFinished(report)),
                    Err(_) => error!("Info redo pass terminated due to panic"),
                }
            });
        if let Err(error) = spawned {
            shared.redo.finish();
            error!("Failed to start info redo thread: {}", error);
            return false;
        }
        true
    }
}

impl InfoDb {
    /// Wires the cache together, initializes the redo timestamp when it was
    /// never set, and runs one opportunistic redo check.
    pub fn open(
        store: InfoStore,
        lookup: Arc<dyn InfoLookup>,
        state_store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        options: InfoDbOptions,
    ) -> InfoDbResult<Self> {
        let state = ReconciliationState::new(state_store);
        state.ensure_initialized(clock.now_unix_ms())?;

        let (bus_producer, _) = broadcast::channel(options.bus_capacity.max(1));
        let shared = Arc::new(Shared {
            store,
            lookup,
            state,
            clock,
            redo: RedoScheduler::new(options.redo_cooldown),
            bus_producer,
        });

        let worker_shared = Arc::clone(&shared);
        let lookup_pool = LookupPool::new(
            options.lookup_workers,
            options.lookup_queue_capacity,
            move |job| worker_shared.populate(job),
        )?;

        let info_db = Self {
            lookup_pool,
            shared,
        };
        info_db.trigger_redo();
        Ok(info_db)
    }

    /// Subscribes to cache notifications.
    pub fn subscribe(&self) -> Receiver<InfoMessage> {
        self.shared.bus_producer.subscribe()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> CacheEntry {
        let key = cache_key(path.as_ref());
        self.shared.store.lock().get(&key)
    }

    /// Returns the record when the path has a positive entry.
    pub fn record(&self, path: impl AsRef<Path>) -> Option<InfoRecord> {
        self.get(path).into_record()
    }

    /// Queues a lookup for a path that has never been looked up.
    ///
    /// A path that already has an entry (positive or negative) is not looked up
    /// again; instead this checks whether a redo pass is due.
    pub fn background_add(&self, path: impl AsRef<Path>, display_name_hint: &str) -> AddOutcome {
        let key = cache_key(path.as_ref());
        let known = self.shared.store.lock().contains(&key);
        if known {
            self.trigger_redo();
            return AddOutcome::AlreadyCached;
        }

        let job = LookupJob {
            path: key,
            display_name: display_name_hint.to_string(),
        };
        match self.lookup_pool.submit(job) {
            Ok(()) => AddOutcome::Queued,
            Err(SubmitError::Full(job)) | Err(SubmitError::Closed(job)) => {
                warn!("Info lookup queue unavailable, dropping request for {}", job.path);
                AddOutcome::QueueFull
            }
        }
    }

    /// Moves the entry for `old_path` to `new_path`. Returns `false` when
    /// `old_path` had no entry.
    pub fn move_info(
        &self,
        old_path: impl AsRef<Path>,
        new_path: impl AsRef<Path>,
    ) -> InfoDbResult<bool> {
        let old_key = cache_key(old_path.as_ref());
        let new_key = cache_key(new_path.as_ref());
        let moved = self.shared.store.lock().rename(&old_key, &new_key)?;
        if moved {
            self.shared.emit(InfoMessage::EntryMoved {
                from: old_key,
                to: new_key,
            });
        }
        Ok(moved)
    }

    /// Starts a redo pass when one is due. Returns whether a pass was launched.
    pub fn trigger_redo(&self) -> bool {
        Shared::trigger_redo(&self.shared)
    }

    /// Writes any deferred store changes.
    pub fn flush(&self) -> InfoDbResult<usize> {
        self.shared.store.lock().sync()
    }

    pub fn stats(&self) -> InfoDbStats {
        let guard = self.shared.store.lock();
        InfoDbStats {
            entries: guard.len(),
            negative_entries: guard.negative_count(),
            redo_running: self.shared.redo.is_scanning(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use super::{InfoDb, InfoDbOptions};
    use crate::clock::Clock;
    use crate::error::LookupError;
    use crate::info_store::{InfoStore, SyncMode};
    use crate::lookup::InfoLookup;
    use crate::lookup_pool::LookupJob;
    use crate::negative_cache::StoredInfo;
    use crate::protocol::{AddOutcome, CacheEntry, InfoMessage, InfoRecord, RedoReport};
    use crate::state_store::{
        MemoryStateStore, ReconciliationState, StateStore, INFO_DB_RETRY_KEY, LAST_INFO_REREAD_KEY,
    };
    use crate::test_support::{
        fields, wait_for_message, ManualClock, ReadOnlyStateStore, ScriptedLookup,
    };

    const WAIT: Duration = Duration::from_secs(5);
    const COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    const START_MS: i64 = 1_700_000_000_000;

    struct Harness {
        info_db: InfoDb,
        lookup: Arc<ScriptedLookup>,
        state_store: Arc<MemoryStateStore>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(InfoStore::new_in_memory().expect("in-memory store"))
        }

        fn with_store(store: InfoStore) -> Self {
            let lookup = Arc::new(ScriptedLookup::new());
            let state_store = Arc::new(MemoryStateStore::new());
            let clock = Arc::new(ManualClock::at(START_MS));
            let info_db = InfoDb::open(
                store,
                lookup.clone(),
                state_store.clone(),
                clock.clone(),
                InfoDbOptions {
                    lookup_workers: 2,
                    lookup_queue_capacity: 16,
                    ..InfoDbOptions::default()
                },
            )
            .expect("info db should open");
            Self {
                info_db,
                lookup,
                state_store,
                clock,
            }
        }

        fn state(&self) -> ReconciliationState {
            ReconciliationState::new(self.state_store.clone())
        }
    }

    fn seeded_store(entries: &[(&str, StoredInfo)]) -> InfoStore {
        let store = InfoStore::new_in_memory().expect("in-memory store");
        {
            let mut guard = store.lock();
            for (key, value) in entries {
                guard
                    .put(key, value.clone(), SyncMode::Immediate)
                    .expect("seed entry");
            }
        }
        store
    }

    fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn is_stored_for(path: &str) -> impl FnMut(&InfoMessage) -> bool + '_ {
        move |message: &InfoMessage| {
            matches!(message, InfoMessage::EntryStored { path: stored, .. } if stored == path)
        }
    }

    #[test]
    fn test_untouched_cache_reports_absent() {
        let harness = Harness::new();
        assert_eq!(harness.info_db.get("/movies/a.mkv"), CacheEntry::Absent);
        assert_eq!(harness.info_db.record("/movies/a.mkv"), None);
        assert_eq!(harness.info_db.stats().entries, 0);
    }

    #[test]
    fn test_open_initializes_redo_timestamp_once() {
        let harness = Harness::new();
        assert_eq!(
            harness.state().last_redo_unix_ms(START_MS + 10),
            START_MS
        );
    }

    #[test]
    fn test_background_add_stores_positive_record() {
        let harness = Harness::new();
        harness.lookup.respond(
            "/movies/a.mkv",
            Ok(Some(fields(&["tt123", "", "A Movie", "", "", "2000"]))),
        );
        let mut observer = harness.info_db.subscribe();

        assert_eq!(
            harness.info_db.background_add("/movies/a.mkv", "A Movie (2000)"),
            AddOutcome::Queued
        );
        wait_for_message(&mut observer, WAIT, is_stored_for("/movies/a.mkv"))
            .expect("lookup result should be stored");

        let record = harness
            .info_db
            .record("/movies/a.mkv")
            .expect("entry should be positive");
        assert_eq!(
            record,
            InfoRecord {
                catalog_id: "tt123".to_string(),
                title: "A Movie".to_string(),
                year: "2000".to_string(),
                ..InfoRecord::default()
            }
        );
        assert_eq!(
            harness.lookup.calls_for("/movies/a.mkv"),
            vec!["A Movie (2000)".to_string()]
        );
    }

    #[test]
    fn test_empty_lookup_stores_negative_and_is_not_repeated() {
        let harness = Harness::new();
        let mut observer = harness.info_db.subscribe();

        harness.info_db.background_add("/movies/b.mkv", "b");
        let stored = wait_for_message(&mut observer, WAIT, is_stored_for("/movies/b.mkv"))
            .expect("negative result should be stored");
        assert_eq!(
            stored,
            InfoMessage::EntryStored {
                path: "/movies/b.mkv".to_string(),
                entry: CacheEntry::Negative,
            }
        );
        assert_eq!(harness.info_db.get("/movies/b.mkv"), CacheEntry::Negative);

        assert_eq!(
            harness.info_db.background_add("/movies/b.mkv", "b again"),
            AddOutcome::AlreadyCached
        );
        assert_eq!(harness.lookup.call_count(), 1);
        assert_eq!(harness.info_db.stats().negative_entries, 1);
    }

    #[test]
    fn test_failed_lookup_leaves_path_absent_and_retryable() {
        let harness = Harness::new();
        harness.lookup.respond(
            "/movies/c.mkv",
            Err(LookupError::Failed("connection refused".to_string())),
        );
        let mut observer = harness.info_db.subscribe();

        harness.info_db.background_add("/movies/c.mkv", "c");
        let failed = wait_for_message(&mut observer, WAIT, |message| {
            matches!(message, InfoMessage::LookupFailed { .. })
        })
        .expect("failure should be reported");
        assert!(matches!(
            failed,
            InfoMessage::LookupFailed { ref path, .. } if path == "/movies/c.mkv"
        ));
        assert_eq!(harness.info_db.get("/movies/c.mkv"), CacheEntry::Absent);

        harness
            .lookup
            .respond("/movies/c.mkv", Ok(Some(fields(&["tt7", "", "C", "", "", ""]))));
        assert_eq!(
            harness.info_db.background_add("/movies/c.mkv", "c"),
            AddOutcome::Queued
        );
        wait_for_message(&mut observer, WAIT, is_stored_for("/movies/c.mkv"))
            .expect("retry should be stored");
        assert_eq!(harness.lookup.call_count(), 2);
        assert!(harness.info_db.record("/movies/c.mkv").is_some());
    }

    #[test]
    fn test_move_info_carries_value_to_new_path() {
        let record = StoredInfo::Found(InfoRecord {
            catalog_id: "tt1".to_string(),
            title: "Moved".to_string(),
            ..InfoRecord::default()
        });
        let harness = Harness::with_store(seeded_store(&[
            ("/old/a.mkv", record.clone()),
            ("/old/b.mkv", StoredInfo::negative()),
        ]));
        let before = harness.info_db.get("/old/a.mkv");

        assert!(harness
            .info_db
            .move_info("/old/a.mkv", "/new/a.mkv")
            .expect("move"));
        assert_eq!(harness.info_db.get("/old/a.mkv"), CacheEntry::Absent);
        assert_eq!(harness.info_db.get("/new/a.mkv"), before);

        assert!(harness
            .info_db
            .move_info("/old/b.mkv", "/new/b.mkv")
            .expect("move negative"));
        assert_eq!(harness.info_db.get("/new/b.mkv"), CacheEntry::Negative);

        assert!(!harness
            .info_db
            .move_info("/old/missing.mkv", "/new/missing.mkv")
            .expect("move missing"));
        assert_eq!(harness.info_db.get("/new/missing.mkv"), CacheEntry::Absent);
        assert_eq!(harness.lookup.call_count(), 0);
    }

    #[test]
    fn test_redo_upgrades_negative_entry_after_cooldown() {
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::negative(),
        )]));
        harness.clock.advance(COOLDOWN + Duration::from_millis(1));
        harness
            .state()
            .set_retry_enabled(true)
            .expect("enable retry");
        harness.lookup.respond(
            "/movies/a.mkv",
            Ok(Some(fields(&["tt999", "", "B Movie", "", "", "1999"]))),
        );
        let mut observer = harness.info_db.subscribe();

        assert_eq!(
            harness.info_db.background_add("/movies/a.mkv", "a"),
            AddOutcome::AlreadyCached
        );
        let finished = wait_for_message(&mut observer, WAIT, |message| {
            matches!(message, InfoMessage::RedoFinished(_))
        })
        .expect("redo should finish");
        assert_eq!(
            finished,
            InfoMessage::RedoFinished(RedoReport {
                retried: 1,
                upgraded: 1
            })
        );

        let record = harness
            .info_db
            .record("/movies/a.mkv")
            .expect("entry should be upgraded");
        assert_eq!(record.title, "B Movie");
        assert_eq!(record.year, "1999");
        assert_eq!(
            harness.lookup.calls_for("/movies/a.mkv"),
            vec!["a.mkv".to_string()]
        );
        assert_eq!(
            harness.state().last_redo_unix_ms(0),
            harness.clock.now_unix_ms()
        );
        assert!(wait_until(|| !harness.info_db.stats().redo_running));
    }

    #[test]
    fn test_redo_waits_for_cooldown() {
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::negative(),
        )]));
        harness
            .state()
            .set_retry_enabled(true)
            .expect("enable retry");
        harness.clock.advance(COOLDOWN);

        assert_eq!(
            harness.info_db.background_add("/movies/a.mkv", "a"),
            AddOutcome::AlreadyCached
        );
        assert!(!harness.info_db.trigger_redo());
        assert_eq!(harness.lookup.call_count(), 0);
        assert_eq!(harness.info_db.get("/movies/a.mkv"), CacheEntry::Negative);
    }

    #[test]
    fn test_redo_requires_retry_flag() {
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::negative(),
        )]));
        harness.clock.advance(COOLDOWN * 2);
        assert!(!harness.info_db.trigger_redo());
        assert_eq!(harness.lookup.call_count(), 0);
    }

    #[test]
    fn test_malformed_redo_timestamp_defers_redo() {
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::negative(),
        )]));
        harness
            .state_store
            .set_value("last_info_reread", "garbage")
            .expect("corrupt timestamp");
        harness
            .state()
            .set_retry_enabled(true)
            .expect("enable retry");
        harness.clock.advance(COOLDOWN * 10);

        assert!(!harness.info_db.trigger_redo());
        assert_eq!(harness.lookup.call_count(), 0);
    }

    #[test]
    fn test_open_runs_due_redo_at_startup() {
        let store = seeded_store(&[("/movies/a.mkv", StoredInfo::negative())]);
        let lookup = Arc::new(ScriptedLookup::new());
        lookup.respond(
            "/movies/a.mkv",
            Ok(Some(fields(&["tt5", "", "Startup", "", "", ""]))),
        );
        let state_store = Arc::new(MemoryStateStore::new());
        let state = ReconciliationState::new(state_store.clone());
        state.mark_redo_started(0).expect("old redo time");
        state.set_retry_enabled(true).expect("enable retry");

        let info_db = InfoDb::open(
            store,
            lookup.clone(),
            state_store,
            Arc::new(ManualClock::at(START_MS)),
            InfoDbOptions::default(),
        )
        .expect("info db should open");

        assert!(wait_until(|| info_db.record("/movies/a.mkv").is_some()));
        assert_eq!(lookup.call_count(), 1);
    }

    #[test]
    fn test_panicking_redo_lookup_keeps_cache_usable() {
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::negative(),
        )]));
        harness.clock.advance(COOLDOWN + Duration::from_millis(1));
        harness
            .state()
            .set_retry_enabled(true)
            .expect("enable retry");
        harness.lookup.panic_on("/movies/a.mkv");
        let mut observer = harness.info_db.subscribe();

        assert!(harness.info_db.trigger_redo());
        let finished = wait_for_message(&mut observer, WAIT, |message| {
            matches!(message, InfoMessage::RedoFinished(_))
        })
        .expect("redo should finish despite the panic");
        assert_eq!(
            finished,
            InfoMessage::RedoFinished(RedoReport {
                retried: 1,
                upgraded: 0
            })
        );

        assert_eq!(harness.info_db.get("/movies/a.mkv"), CacheEntry::Negative);
        assert!(harness
            .info_db
            .move_info("/movies/a.mkv", "/movies/moved.mkv")
            .expect("move after panic"));
        assert_eq!(
            harness.info_db.background_add("/movies/new.mkv", "new"),
            AddOutcome::Queued
        );
        wait_for_message(&mut observer, WAIT, is_stored_for("/movies/new.mkv"))
            .expect("lookups keep working after the panic");
    }

    #[test]
    fn test_unrecordable_redo_start_never_launches_scan() {
        let values = MemoryStateStore::new();
        values
            .set_value(
                LAST_INFO_REREAD_KEY,
                &(START_MS - 2 * COOLDOWN.as_millis() as i64).to_string(),
            )
            .expect("seed timestamp");
        values
            .set_value(INFO_DB_RETRY_KEY, "true")
            .expect("seed retry flag");
        let lookup = Arc::new(ScriptedLookup::new());
        let info_db = InfoDb::open(
            seeded_store(&[("/movies/a.mkv", StoredInfo::negative())]),
            lookup.clone(),
            Arc::new(ReadOnlyStateStore::new(values)),
            Arc::new(ManualClock::at(START_MS)),
            InfoDbOptions::default(),
        )
        .expect("info db should open");

        for _ in 0..5 {
            assert_eq!(
                info_db.background_add("/movies/a.mkv", "a"),
                AddOutcome::AlreadyCached
            );
        }
        assert!(!info_db.trigger_redo());
        assert!(!info_db.stats().redo_running);
        assert_eq!(lookup.call_count(), 0);
    }

    #[test]
    fn test_negative_result_never_replaces_positive_record() {
        let record = InfoRecord {
            title: "Known".to_string(),
            ..InfoRecord::default()
        };
        let harness = Harness::with_store(seeded_store(&[(
            "/movies/a.mkv",
            StoredInfo::Found(record.clone()),
        )]));

        harness.info_db.shared.populate(LookupJob {
            path: "/movies/a.mkv".to_string(),
            display_name: "a".to_string(),
        });
        assert_eq!(
            harness.info_db.get("/movies/a.mkv"),
            CacheEntry::Positive(record)
        );
    }

    struct GatedLookup {
        started: Mutex<mpsc::Sender<String>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl InfoLookup for GatedLookup {
        fn lookup(
            &self,
            file: &Path,
            _display_name: &str,
        ) -> Result<Option<Vec<String>>, LookupError> {
            let _ = self
                .started
                .lock()
                .expect("started lock poisoned")
                .send(file.to_string_lossy().into_owned());
            let _ = self
                .release
                .lock()
                .expect("release lock poisoned")
                .recv_timeout(WAIT);
            Ok(None)
        }
    }

    #[test]
    fn test_full_lookup_queue_rejects_without_storing() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let info_db = InfoDb::open(
            InfoStore::new_in_memory().expect("in-memory store"),
            Arc::new(GatedLookup {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            }),
            Arc::new(MemoryStateStore::new()),
            Arc::new(ManualClock::at(START_MS)),
            InfoDbOptions {
                lookup_workers: 1,
                lookup_queue_capacity: 1,
                ..InfoDbOptions::default()
            },
        )
        .expect("info db should open");

        assert_eq!(info_db.background_add("/a.mkv", "a"), AddOutcome::Queued);
        assert_eq!(
            started_rx.recv_timeout(WAIT).expect("first lookup starts"),
            "/a.mkv"
        );
        assert_eq!(info_db.background_add("/b.mkv", "b"), AddOutcome::Queued);
        assert_eq!(info_db.background_add("/c.mkv", "c"), AddOutcome::QueueFull);
        assert_eq!(info_db.get("/c.mkv"), CacheEntry::Absent);

        release_tx.send(()).expect("release /a.mkv");
        release_tx.send(()).expect("release /b.mkv");
        assert!(wait_until(|| info_db.get("/b.mkv") == CacheEntry::Negative));
        assert_eq!(info_db.get("/c.mkv"), CacheEntry::Absent);
    }
}
