//! Asynchronous write engine
//!
//! One pool, one submission queue and one worker thread. Producers render
//! lines straight into pooled items on their own thread and never touch the
//! file; the worker performs all blocking I/O in submission order.

use super::pool::{Acquire, IndexTag, Operation, WorkPool};
use super::queue::SubmissionQueue;
use super::worker::Worker;
use crate::core::encoder::encode_line;
use crate::core::{LoggerError, LoggerMetrics, Record, Result, SessionInfo};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default number of work items
pub const DEFAULT_POOL_CAPACITY: usize = 64;
/// Default size of one rendered line, newline included
pub const DEFAULT_ITEM_CAPACITY: usize = 2048;
/// Longest explicit index id an item can carry
pub const DEFAULT_INDEX_ID_CAPACITY: usize = 256;

const WORKER_THREAD_NAME: &str = "session-log-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pool_capacity: usize,
    pub item_capacity: usize,
    pub index_id_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            item_capacity: DEFAULT_ITEM_CAPACITY,
            index_id_capacity: DEFAULT_INDEX_ID_CAPACITY,
        }
    }
}

impl EngineConfig {
    #[must_use = "builder methods return a new value"]
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_item_capacity(mut self, capacity: usize) -> Self {
        self.item_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(LoggerError::config("EngineConfig", "pool_capacity must be > 0"));
        }
        // Room for at least one byte of content plus the newline.
        if self.item_capacity < 2 {
            return Err(LoggerError::config("EngineConfig", "item_capacity must be >= 2"));
        }
        Ok(())
    }
}

/// State shared between producers and the worker
pub(crate) struct EngineShared {
    pub(crate) pool: WorkPool,
    pub(crate) queue: SubmissionQueue,
    pub(crate) metrics: Arc<LoggerMetrics>,
}

/// A producer between its running check and its push
///
/// `stop` waits for every admission to end before it queues the exit, so an
/// operation that was let in is always processed.
struct Admission<'a>(&'a AtomicUsize);

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a running pool, queue and worker
///
/// Producers never block on the write path: when every item is in flight the
/// message is dropped and counted. Only `close_session` and `shutdown` wait
/// for a free item.
///
/// # Example
///
/// ```no_run
/// use rust_session_logger::backends::{AsyncEngine, EngineConfig};
///
/// let engine = AsyncEngine::start(EngineConfig::default())?;
/// // ... open sessions with `Session::builder(..).engine(engine.clone())`
/// engine.shutdown();
/// # Ok::<(), rust_session_logger::LoggerError>(())
/// ```
pub struct AsyncEngine {
    shared: Arc<EngineShared>,
    config: EngineConfig,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    running: AtomicBool,
    in_flight: AtomicUsize,
    pid: u32,
}

impl AsyncEngine {
    /// Allocate the pool and spawn the worker
    pub fn start(config: EngineConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let metrics = Arc::new(LoggerMetrics::new());
        let shared = Arc::new(EngineShared {
            pool: WorkPool::new(
                config.pool_capacity,
                config.item_capacity,
                config.index_id_capacity,
                Arc::clone(&metrics),
            ),
            queue: SubmissionQueue::new(config.pool_capacity),
            metrics,
        });

        let worker = Worker::new(Arc::clone(&shared));
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(LoggerError::worker_spawn)?;

        Ok(Arc::new(Self {
            shared,
            config,
            worker: Mutex::new(Some(handle)),
            running: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            pid: std::process::id(),
        }))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Live counters; see [`LoggerMetrics`]
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.shared.metrics
    }

    /// Process that started the engine
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// False in a child forked after the engine started: the worker thread
    /// only exists in the parent.
    pub fn is_current_process(&self) -> bool {
        self.pid == std::process::id()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Items currently free
    pub fn available(&self) -> usize {
        self.shared.pool.available()
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &WorkPool {
        &self.shared.pool
    }

    fn admit(&self) -> Option<Admission<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let admission = Admission(&self.in_flight);
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        Some(admission)
    }

    /// Queue an open of the session's log file.
    ///
    /// Fails with `PoolExhausted` when no item is free, so the caller learns
    /// that the session could not be opened.
    pub fn open_session(&self, session: &Arc<SessionInfo>) -> Result<()> {
        let Some(_admission) = self.admit() else {
            return Err(LoggerError::EngineStopped);
        };
        let slot = self
            .shared
            .pool
            .acquire(Acquire::NoWait)
            .ok_or_else(|| LoggerError::pool_exhausted(self.shared.pool.capacity()))?;
        self.shared.pool.submit(&self.shared.queue, slot, |item| {
            item.op = Operation::Open;
            item.session = Some(Arc::clone(session));
        });
        Ok(())
    }

    /// Render `record` into a free item and queue it.
    ///
    /// Returns false if the message was dropped because the pool was empty
    /// or the engine has stopped.
    pub fn submit_write(&self, session: &Arc<SessionInfo>, record: &Record<'_>) -> bool {
        let Some(_admission) = self.admit() else {
            self.shared.metrics.record_dropped();
            return false;
        };
        let Some(slot) = self.shared.pool.acquire(Acquire::NoWait) else {
            return false;
        };

        let metrics = &self.shared.metrics;
        self.shared.pool.submit(&self.shared.queue, slot, |item| {
            let encoded = encode_line(&mut item.data, &record.line_parts(session));
            if encoded.truncated {
                metrics.record_truncated();
            }
            item.len = encoded.len;
            item.op = if session.flags().reopen_per_write() {
                Operation::OpenWriteClose
            } else {
                Operation::Write
            };

            match record.index_id {
                None => {}
                Some(id) if !session.is_global() && id == session.call_id() => {
                    item.index_tag = IndexTag::Session;
                }
                Some(id) => {
                    if !item.set_custom_index(id) {
                        metrics.record_index_failure();
                    }
                }
            }
            item.session = Some(Arc::clone(session));
        });
        true
    }

    /// Queue the close of a session, waiting for a free item if necessary.
    ///
    /// The worker drops the last reference to `session` once every write
    /// queued before the close has been processed.
    pub fn close_session(&self, session: Arc<SessionInfo>) {
        let Some(_admission) = self.admit() else {
            return;
        };
        let Some(slot) = self.shared.pool.acquire(Acquire::Wait) else {
            return;
        };
        self.shared.pool.submit(&self.shared.queue, slot, |item| {
            item.op = Operation::Close;
            item.session = Some(session);
        });
    }

    /// Drain the queue and join the worker.
    ///
    /// Every operation queued before this call is processed first. Later
    /// submissions are dropped. Calling it again is a no-op.
    pub fn shutdown(&self) {
        self.stop(None);
    }

    /// Like [`shutdown`](Self::shutdown) but gives up waiting for the
    /// worker after `timeout`. Returns false if the worker did not finish.
    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        self.stop(Some(timeout))
    }

    fn stop(&self, timeout: Option<Duration>) -> bool {
        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        if !self.is_current_process() {
            // The worker thread does not exist in a forked child; the items
            // it was processing belong to the parent.
            self.running.store(false, Ordering::SeqCst);
            std::mem::forget(handle);
            return true;
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        self.running.store(false, Ordering::SeqCst);

        // Producers already admitted push before EXIT does.
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            thread::yield_now();
        }

        let exit = match deadline {
            Some(deadline) => self
                .shared
                .pool
                .acquire_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.shared.pool.acquire(Acquire::Wait),
        };

        let Some(slot) = exit else {
            tracing::warn!("async log worker did not accept exit; pending lines may be lost");
            self.shared.pool.close();
            return false;
        };
        self.shared.pool.submit(&self.shared.queue, slot, |item| {
            item.op = Operation::Exit;
        });

        let finished = match timeout {
            None => {
                if handle.join().is_err() {
                    tracing::error!("async log worker panicked");
                }
                true
            }
            Some(_) => Self::join_timeout(handle, deadline),
        };
        self.shared.pool.close();

        let dropped = self.shared.metrics.dropped_count();
        if dropped > 0 {
            tracing::warn!(
                dropped,
                written = self.shared.metrics.total_written(),
                "async log engine dropped messages under load"
            );
        }
        finished
    }

    fn join_timeout(handle: thread::JoinHandle<()>, deadline: Option<Instant>) -> bool {
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("async log worker panicked");
                }
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!("async log worker did not finish in time");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for AsyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AsyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncEngine")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("pid", &self.pid)
            .field("available", &self.available())
            .finish()
    }
}
