//! Synchronous file backend
//!
//! Writes on the calling thread, using the same cross-process append lock and
//! index recording as the asynchronous worker.

use crate::core::encoder::encode_unbounded;
use crate::core::file_lock::locked_append;
use crate::core::{Backend, IndexWriter, LoggerError, LoggerMetrics, Record, Result, SessionInfo};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append one rendered line under the append lock and, when an index id and
/// an index directory are both present, record where it landed.
///
/// Failures are counted, never returned.
pub(crate) fn append_line(
    file: &File,
    line: &[u8],
    index_id: Option<&str>,
    index: Option<&IndexWriter>,
    metrics: &LoggerMetrics,
) {
    let result = locked_append(file, line, |file, offset, len| {
        if let (Some(id), Some(index)) = (index_id, index) {
            if let Err(e) = index.record(id, file, offset, len) {
                metrics.record_index_failure();
                tracing::trace!(error = %e, dir = %index.dir().display(), "index record failed");
            }
        }
    });

    match result {
        Ok(_) => {
            metrics.record_written();
        }
        Err(e) => {
            metrics.record_unwritable();
            tracing::debug!(error = %e, "log append failed");
        }
    }
}

pub struct FileBackend {
    file: Option<File>,
    metrics: LoggerMetrics,
}

impl FileBackend {
    pub fn new() -> Self {
        Self {
            file: None,
            metrics: LoggerMetrics::new(),
        }
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FileBackend {
    fn open(&mut self, session: &Arc<SessionInfo>) -> Result<()> {
        if session.flags().reopen_per_write() {
            return Ok(());
        }
        let file = open_append(session.path()).map_err(|e| {
            LoggerError::io_operation(
                "opening log file",
                format!("cannot open '{}' for append", session.path().display()),
                e,
            )
        })?;
        self.file = Some(file);
        Ok(())
    }

    fn write(&self, session: &Arc<SessionInfo>, record: &Record<'_>) {
        let mut line = Vec::with_capacity(256);
        encode_unbounded(&mut line, &record.line_parts(session));

        if session.flags().reopen_per_write() {
            match open_append(session.path()) {
                Ok(file) => append_line(&file, &line, record.index_id, session.index(), &self.metrics),
                Err(_) => {
                    self.metrics.record_unwritable();
                }
            }
            return;
        }

        match self.file.as_ref() {
            Some(file) => append_line(file, &line, record.index_id, session.index(), &self.metrics),
            None => {
                self.metrics.record_unwritable();
            }
        }
    }

    fn close(self: Box<Self>, _session: Arc<SessionInfo>) {}

    fn metrics(&self) -> Option<LoggerMetrics> {
        Some(self.metrics.clone())
    }

    fn name(&self) -> &str {
        "logfile"
    }
}
