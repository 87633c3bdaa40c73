//! Backend trait for log output destinations

use super::{
    encoder::LineParts, error::Result, log_level::LogLevel, metrics::LoggerMetrics,
    session::SessionInfo,
};
use std::fmt;
use std::sync::Arc;

/// One message on its way to a backend
#[derive(Clone, Copy)]
pub struct Record<'a> {
    pub level: LogLevel,
    pub timestamp: &'a str,
    /// Error description appended as `: <error>`
    pub error: Option<&'a str>,
    /// Identity to record in the index side file, if any
    pub index_id: Option<&'a str>,
    pub message: fmt::Arguments<'a>,
}

impl<'a> Record<'a> {
    pub fn line_parts(&self, session: &'a SessionInfo) -> LineParts<'a> {
        LineParts {
            timestamp: self.timestamp,
            identity: session.call_id(),
            app: session.app(),
            message: self.message,
            error: self.error,
        }
    }
}

/// Output capability of a session.
///
/// One boxed backend exists per session and holds that session's private
/// output state. Only `open` may fail; writes that cannot be delivered are
/// dropped.
pub trait Backend: Send + Sync {
    fn open(&mut self, session: &Arc<SessionInfo>) -> Result<()>;

    fn write(&self, session: &Arc<SessionInfo>, record: &Record<'_>);

    /// Release the session. Backends that finish asynchronously keep
    /// `session` alive until the last queued operation has run.
    fn close(self: Box<Self>, session: Arc<SessionInfo>);

    fn heartbeat(&self, _session: &Arc<SessionInfo>) {}

    /// Snapshot of the counters this backend feeds, if it keeps any
    fn metrics(&self) -> Option<LoggerMetrics> {
        None
    }

    fn name(&self) -> &str;
}
