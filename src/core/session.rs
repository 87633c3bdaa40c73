//! Sessions: the frontend handle applications log through
//!
//! A session is one logging stream with its own identity, severity threshold
//! and backend state. Messages below the threshold are discarded before any
//! formatting happens.

use super::{
    backend::{Backend, Record},
    config::{BackendKind, LogConfig},
    encoder::BoundedWriter,
    error::Result,
    index::IndexWriter,
    log_level::LogLevel,
    metrics::LoggerMetrics,
    timestamp::{TimestampFormat, TIMESTAMP_BUF_LEN},
};
use crate::backends::{AsyncEngine, AsyncFileBackend, ConsoleBackend, FileBackend};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Identity used by sessions opened without a call id
pub const GLOBAL_IDENTITY: &str = "GLOBAL";

const ERROR_TEXT_LEN: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Session behaviour flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionFlags(u32);

impl SessionFlags {
    pub const NONE: SessionFlags = SessionFlags(0);
    /// Open, write and close the log file for every message instead of
    /// keeping it open for the session's lifetime
    pub const REOPEN: SessionFlags = SessionFlags(1);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        SessionFlags(bits)
    }

    pub const fn contains(&self, other: SessionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn reopen_per_write(&self) -> bool {
        self.contains(SessionFlags::REOPEN)
    }
}

impl BitOr for SessionFlags {
    type Output = SessionFlags;

    fn bitor(self, rhs: Self) -> Self {
        SessionFlags(self.0 | rhs.0)
    }
}

/// Immutable description of an open session, shared with its backend
#[derive(Debug)]
pub struct SessionInfo {
    id: u64,
    app: String,
    call_id: String,
    global: bool,
    flags: SessionFlags,
    path: PathBuf,
    index: Option<IndexWriter>,
    pid: u32,
}

impl SessionInfo {
    pub fn new(
        app: impl Into<String>,
        call_id: Option<&str>,
        flags: SessionFlags,
        config: &LogConfig,
    ) -> Self {
        let (call_id, global) = match call_id {
            Some(id) => (id.to_string(), false),
            None => (GLOBAL_IDENTITY.to_string(), true),
        };
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            app: app.into(),
            call_id,
            global,
            flags,
            path: config.path.clone(),
            index: config.index_dir.as_ref().map(IndexWriter::new),
            pid: std::process::id(),
        }
    }

    /// Process-unique session number
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    /// Identity printed on every line and used for indexing
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> Option<&IndexWriter> {
        self.index.as_ref()
    }

    /// Process that opened the session
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// An open logging stream
///
/// # Example
///
/// ```no_run
/// use rust_session_logger::prelude::*;
/// use rust_session_logger::slog_info;
///
/// let session = Session::builder("proxy")
///     .call_id("1234@1.2.3.4")
///     .config(LogConfig::default().with_backend(BackendKind::LogfileAsync))
///     .open()?;
///
/// slog_info!(session, "INVITE from {}", "alice");
/// session.close();
/// # Ok::<(), LoggerError>(())
/// ```
pub struct Session {
    info: Arc<SessionInfo>,
    level: AtomicU8,
    timestamp_format: TimestampFormat,
    backend: Option<Box<dyn Backend>>,
}

impl Session {
    /// Open a session configured from the environment
    pub fn open(app: &str, call_id: Option<&str>, flags: SessionFlags) -> Result<Self> {
        let mut builder = Session::builder(app).flags(flags);
        if let Some(call_id) = call_id {
            builder = builder.call_id(call_id);
        }
        builder.open()
    }

    #[must_use]
    pub fn builder(app: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(app)
    }

    pub fn info(&self) -> &Arc<SessionInfo> {
        &self.info
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the threshold, returning the previous one
    pub fn set_level(&self, level: LogLevel) -> LogLevel {
        LogLevel::from_u8(self.level.swap(level as u8, Ordering::Relaxed))
    }

    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map_or("closed", |b| b.name())
    }

    pub fn metrics(&self) -> Option<LoggerMetrics> {
        self.backend.as_ref().and_then(|b| b.metrics())
    }

    fn default_index_id(&self) -> Option<&str> {
        if self.info.is_global() {
            None
        } else {
            Some(self.info.call_id())
        }
    }

    fn emit(&self, level: LogLevel, error: Option<&str>, index_id: Option<&str>, message: fmt::Arguments<'_>) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        let mut ts_buf = [0u8; TIMESTAMP_BUF_LEN];
        let mut ts = BoundedWriter::new(&mut ts_buf);
        let _ = self.timestamp_format.write_to(&mut ts, &Local::now());

        let record = Record {
            level,
            timestamp: ts.as_str(),
            error,
            index_id,
            message,
        };
        backend.write(&self.info, &record);
    }

    pub fn write(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.emit(level, None, self.default_index_id(), message);
    }

    /// Write with an error description appended as `: <error>`
    pub fn ewrite(&self, level: LogLevel, error: &dyn fmt::Display, message: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let mut err_buf = [0u8; ERROR_TEXT_LEN];
        let mut err = BoundedWriter::new(&mut err_buf);
        use std::fmt::Write as _;
        let _ = write!(err, "{}", error);
        self.emit(level, Some(err.as_str()), self.default_index_id(), message);
    }

    /// Write with the calling thread's last OS error appended
    pub fn ewrite_os(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        let os_error = std::io::Error::last_os_error();
        self.ewrite(level, &os_error, message);
    }

    /// Write, indexing the line under `index_id` instead of the session
    /// identity
    pub fn iwrite(&self, level: LogLevel, index_id: &str, message: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.emit(level, None, Some(index_id), message);
    }

    /// Give the backend a chance to run periodic maintenance
    pub fn heartbeat(&self) {
        if let Some(backend) = self.backend.as_ref() {
            backend.heartbeat(&self.info);
        }
    }

    /// Close the session. For the asynchronous backend this returns once the
    /// close is queued; all earlier writes are still processed first.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.close(Arc::clone(&self.info));
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("level", &self.level())
            .field("backend", &self.backend_name())
            .finish()
    }
}

/// Builder for opening a [`Session`]
pub struct SessionBuilder {
    app: String,
    call_id: Option<String>,
    flags: SessionFlags,
    config: Option<LogConfig>,
    engine: Option<Arc<AsyncEngine>>,
}

impl SessionBuilder {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            call_id: None,
            flags: SessionFlags::NONE,
            config: None,
            engine: None,
        }
    }

    /// Identity of the session; without one the session is global
    #[must_use = "builder methods return a new value"]
    pub fn call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flags(mut self, flags: SessionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Use `config` instead of reading the environment
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Route asynchronous writes through `engine` instead of the
    /// process-wide one
    #[must_use = "builder methods return a new value"]
    pub fn engine(mut self, engine: Arc<AsyncEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn open(self) -> Result<Session> {
        let config = self.config.unwrap_or_else(LogConfig::from_env);
        let info = Arc::new(SessionInfo::new(
            self.app,
            self.call_id.as_deref(),
            self.flags,
            &config,
        ));

        let mut backend: Box<dyn Backend> = match config.backend {
            BackendKind::Stderr => Box::new(ConsoleBackend::from_config(&config)),
            BackendKind::Logfile => Box::new(FileBackend::new()),
            BackendKind::LogfileAsync => match self.engine {
                Some(engine) => Box::new(AsyncFileBackend::with_engine(engine)),
                None => Box::new(AsyncFileBackend::new()?),
            },
        };
        backend.open(&info)?;

        Ok(Session {
            info,
            level: AtomicU8::new(config.level as u8),
            timestamp_format: config.timestamp_format,
            backend: Some(backend),
        })
    }
}
