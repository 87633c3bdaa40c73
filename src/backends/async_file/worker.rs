//! The single consumer thread
//!
//! Pops items in arrival order, performs the file operation they describe and
//! returns them to the pool. This thread owns every descriptor the engine
//! opens, keyed by session id, so no per-session locking is needed.

use super::engine::EngineShared;
use super::pool::{Operation, WorkItem};
use crate::backends::file::{append_line, open_append};
use crate::core::LoggerMetrics;
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

pub(crate) struct Worker {
    shared: Arc<EngineShared>,
    files: HashMap<u64, File>,
}

impl Worker {
    pub(crate) fn new(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            files: HashMap::new(),
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!(
            pool = self.shared.pool.capacity(),
            "async log worker started"
        );

        let shared = Arc::clone(&self.shared);
        while let Some(slot) = shared.queue.pop() {
            let exit = {
                let mut item = shared.pool.item(&slot);
                let exit = self.process(&item);
                // Drops the session reference; after a close this is where
                // the session is destroyed.
                item.reset();
                exit
            };
            shared.pool.release(slot);
            if exit {
                break;
            }
        }

        if !self.files.is_empty() {
            tracing::debug!(open = self.files.len(), "closing descriptors left open at exit");
        }
        tracing::debug!("async log worker stopped");
    }

    /// Returns true when the loop should stop
    fn process(&mut self, item: &WorkItem) -> bool {
        let metrics: &LoggerMetrics = &self.shared.metrics;

        match item.op {
            Operation::Exit => return true,
            Operation::Open => {
                let Some(session) = item.session.as_deref() else {
                    return false;
                };
                match open_append(session.path()) {
                    Ok(file) => {
                        self.files.insert(session.id(), file);
                    }
                    Err(e) => {
                        // Later writes for this session become no-ops.
                        self.files.remove(&session.id());
                        tracing::debug!(
                            path = %session.path().display(),
                            error = %e,
                            "async open failed"
                        );
                    }
                }
            }
            Operation::Write => {
                let Some(session) = item.session.as_deref() else {
                    return false;
                };
                match self.files.get(&session.id()) {
                    Some(file) => append_line(file, item.line(), item.index_id(), session.index(), metrics),
                    None => {
                        metrics.record_unwritable();
                    }
                }
            }
            Operation::Close => {
                if let Some(session) = item.session.as_deref() {
                    self.files.remove(&session.id());
                }
            }
            Operation::OpenWriteClose => {
                let Some(session) = item.session.as_deref() else {
                    return false;
                };
                match open_append(session.path()) {
                    Ok(file) => append_line(&file, item.line(), item.index_id(), session.index(), metrics),
                    Err(e) => {
                        metrics.record_unwritable();
                        tracing::trace!(
                            path = %session.path().display(),
                            error = %e,
                            "reopen for write failed"
                        );
                    }
                }
            }
        }
        false
    }
}
