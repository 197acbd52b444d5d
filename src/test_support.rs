//! Fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::{error::TryRecvError, Receiver};

use crate::clock::Clock;
use crate::error::{InfoDbError, InfoDbResult, LookupError};
use crate::lookup::InfoLookup;
use crate::protocol::InfoMessage;
use crate::state_store::{MemoryStateStore, StateStore};

type LookupResponse = Result<Option<Vec<String>>, LookupError>;

pub(crate) fn fields(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Lookup returning per-path canned responses (default: nothing found) and
/// recording every call.
#[derive(Default)]
pub(crate) struct ScriptedLookup {
    responses: Mutex<HashMap<String, LookupResponse>>,
    panicking: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLookup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, path: &str, response: LookupResponse) {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .insert(path.to_string(), response);
    }

    /// Makes every lookup of `path` panic.
    pub(crate) fn panic_on(&self, path: &str) {
        self.panicking
            .lock()
            .expect("panicking lock poisoned")
            .insert(path.to_string());
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    /// Display names passed for `path`, in call order.
    pub(crate) fn calls_for(&self, path: &str) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|(called_path, _)| called_path == path)
            .map(|(_, display_name)| display_name.clone())
            .collect()
    }
}

impl InfoLookup for ScriptedLookup {
    fn lookup(&self, file: &Path, display_name: &str) -> LookupResponse {
        let path = file.to_string_lossy().into_owned();
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((path.clone(), display_name.to_string()));
        let should_panic = self
            .panicking
            .lock()
            .expect("panicking lock poisoned")
            .contains(&path);
        if should_panic {
            panic!("scripted lookup panic for {path}");
        }
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .get(&path)
            .cloned()
            .unwrap_or(Ok(None))
    }
}

/// State store that serves pre-seeded values and rejects every write.
pub(crate) struct ReadOnlyStateStore {
    values: MemoryStateStore,
}

impl ReadOnlyStateStore {
    pub(crate) fn new(values: MemoryStateStore) -> Self {
        Self { values }
    }
}

impl StateStore for ReadOnlyStateStore {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values.get_value(key)
    }

    fn set_value(&self, key: &str, _value: &str) -> InfoDbResult<()> {
        Err(InfoDbError::State(format!("state is read-only, cannot write {key}")))
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    now_unix_ms: AtomicI64,
}

impl ManualClock {
    pub(crate) fn at(now_unix_ms: i64) -> Self {
        Self {
            now_unix_ms: AtomicI64::new(now_unix_ms),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now_unix_ms
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_ms(&self) -> i64 {
        self.now_unix_ms.load(Ordering::SeqCst)
    }
}

/// Polls `receiver` until a message matching `predicate` arrives or `timeout` passes.
pub(crate) fn wait_for_message<F>(
    receiver: &mut Receiver<InfoMessage>,
    timeout: Duration,
    mut predicate: F,
) -> Option<InfoMessage>
where
    F: FnMut(&InfoMessage) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match receiver.try_recv() {
            Ok(message) if predicate(&message) => return Some(message),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
            Err(TryRecvError::Closed) => return None,
        }
    }
    None
}
