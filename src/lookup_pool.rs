//! Bounded pool of lookup worker threads.
//!
//! Jobs travel over a `sync_channel`; when it is full, [`LookupPool::submit`]
//! hands the job back instead of blocking or spawning more threads.

use std::any::Any;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error};

use crate::error::InfoDbResult;

/// One pending lookup for a path that had no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupJob {
    pub path: String,
    pub display_name: String,
}

/// Why a job was handed back by [`LookupPool::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Full(LookupJob),
    Closed(LookupJob),
}

pub struct LookupPool {
    sender: Option<SyncSender<LookupJob>>,
    workers: Vec<JoinHandle<()>>,
}

pub(crate) fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn run_worker<F>(receiver: Arc<Mutex<Receiver<LookupJob>>>, handler: Arc<F>)
where
    F: Fn(LookupJob) + Send + Sync + 'static,
{
    loop {
        let next = {
            let receiver = receiver.lock().expect("lookup queue lock poisoned");
            receiver.recv()
        };
        let Ok(job) = next else {
            break;
        };
        let path = job.path.clone();
        let run_result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(job)));
        if let Err(payload) = run_result {
            error!(
                "Lookup job for {} panicked: {}",
                path,
                panic_payload_to_string(payload.as_ref())
            );
        }
    }
}

impl LookupPool {
    /// Starts `worker_count` threads sharing a queue of `queue_capacity` jobs.
    pub fn new<F>(worker_count: usize, queue_capacity: usize, handler: F) -> InfoDbResult<Self>
    where
        F: Fn(LookupJob) + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<LookupJob>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(worker_count.max(1));
        for index in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("infodb-lookup-{index}"))
                .spawn(move || run_worker(receiver, handler))?;
            workers.push(worker);
        }
        debug!(
            "Started {} lookup workers (queue capacity {})",
            workers.len(),
            queue_capacity.max(1)
        );

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queues `job` without blocking.
    pub fn submit(&self, job: LookupJob) -> Result<(), SubmitError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(SubmitError::Closed(job));
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => Err(SubmitError::Full(job)),
            Err(TrySendError::Disconnected(job)) => Err(SubmitError::Closed(job)),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for LookupPool {
    /// Stops accepting jobs, lets workers drain the queue, then joins them.
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Lookup worker exited with a panic");
            }
        }
    }
}
