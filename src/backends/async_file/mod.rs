//! Asynchronous file backend
//!
//! Sessions hand pre-rendered lines to a shared [`AsyncEngine`]; a single
//! worker thread performs the file I/O, locking and indexing.

mod engine;
pub mod lifecycle;
mod pool;
mod queue;
mod worker;

pub use engine::{
    AsyncEngine, EngineConfig, DEFAULT_INDEX_ID_CAPACITY, DEFAULT_ITEM_CAPACITY,
    DEFAULT_POOL_CAPACITY,
};
pub use pool::{Acquire, Operation, SlotId, WorkPool};
pub use queue::SubmissionQueue;

use crate::core::{Backend, LoggerError, LoggerMetrics, Record, Result, SessionInfo};
use parking_lot::RwLock;
use std::sync::Arc;

/// Backend that queues every operation on an [`AsyncEngine`]
pub struct AsyncFileBackend {
    engine: RwLock<Arc<AsyncEngine>>,
    /// Engine came from the process-wide registry and may be replaced
    /// after fork
    shared: bool,
}

impl AsyncFileBackend {
    /// Use the process-wide engine, starting it if needed.
    ///
    /// # Errors
    ///
    /// Fails if the worker thread cannot be spawned.
    pub fn new() -> Result<Self> {
        Ok(Self {
            engine: RwLock::new(lifecycle::engine()?),
            shared: true,
        })
    }

    pub fn with_engine(engine: Arc<AsyncEngine>) -> Self {
        Self {
            engine: RwLock::new(engine),
            shared: false,
        }
    }

    /// The engine to submit to. In a child forked after the engine started
    /// this switches to the child's own engine and, if `reopen`, reopens the
    /// session there.
    fn engine_for(&self, session: &Arc<SessionInfo>, reopen: bool) -> Option<Arc<AsyncEngine>> {
        let engine = Arc::clone(&*self.engine.read());
        if engine.is_current_process() || !self.shared {
            return Some(engine);
        }

        let mut slot = self.engine.write();
        if !slot.is_current_process() {
            let fresh = match lifecycle::engine() {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::debug!(error = %e, "no async engine after fork");
                    return None;
                }
            };
            let stale = std::mem::replace(&mut *slot, Arc::clone(&fresh));
            std::mem::forget(stale);
            if reopen && !session.flags().reopen_per_write() {
                if let Err(e) = fresh.open_session(session) {
                    tracing::debug!(error = %e, "reopen after fork failed");
                }
            }
        }
        Some(Arc::clone(&*slot))
    }
}

impl Backend for AsyncFileBackend {
    fn open(&mut self, session: &Arc<SessionInfo>) -> Result<()> {
        if session.flags().reopen_per_write() {
            return Ok(());
        }
        self.engine_for(session, false)
            .ok_or(LoggerError::EngineStopped)?
            .open_session(session)
    }

    fn write(&self, session: &Arc<SessionInfo>, record: &Record<'_>) {
        if let Some(engine) = self.engine_for(session, true) {
            engine.submit_write(session, record);
        }
    }

    fn close(self: Box<Self>, session: Arc<SessionInfo>) {
        if session.flags().reopen_per_write() {
            return;
        }
        if let Some(engine) = self.engine_for(&session, true) {
            engine.close_session(session);
        }
    }

    fn heartbeat(&self, session: &Arc<SessionInfo>) {
        let _ = self.engine_for(session, true);
    }

    fn metrics(&self) -> Option<LoggerMetrics> {
        Some(self.engine.read().metrics().clone())
    }

    fn name(&self) -> &str {
        "logfile_async"
    }
}
