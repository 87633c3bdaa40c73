//! # Rust Session Logger
//!
//! Per-session application logging with pluggable backends: stderr, a
//! synchronous log file, and an asynchronous file writer that keeps file I/O
//! off the calling thread.
//!
//! ## Features
//!
//! - **Non-blocking writes**: the asynchronous backend renders each line
//!   into a pre-allocated work item and drops it, counted, under overload
//! - **Shared log files**: appends from several processes are serialized
//!   with `fcntl` record locks
//! - **Indexed retrieval**: every indexed line's offset and length is
//!   recorded in a side file keyed by the log file's inode
//! - **Fork aware**: a child process gets its own worker on first use
//!
//! ## Example
//!
//! ```no_run
//! use rust_session_logger::prelude::*;
//! use rust_session_logger::{slog_err, slog_info};
//!
//! let session = Session::open("b2bua", Some("call-42@10.0.0.1"), SessionFlags::NONE)?;
//! slog_info!(session, "received INVITE");
//! slog_err!(session, "no route for {}", "+15551234");
//! session.close();
//! # Ok::<(), LoggerError>(())
//! ```
//!
//! Backend, level and target file come from `SIPLOG_BEND`, `SIPLOG_LVL` and
//! `SIPLOG_LOGFILE_FILE`; see [`LogConfig`].

#[cfg(not(unix))]
compile_error!("rust_session_logger requires a Unix platform");

pub mod backends;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::backends::{lifecycle, AsyncEngine, EngineConfig};
    pub use crate::core::{
        BackendKind, LogConfig, LogLevel, LoggerError, LoggerMetrics, Result, Session,
        SessionBuilder, SessionFlags, TimestampFormat,
    };
}

pub use backends::{AsyncEngine, AsyncFileBackend, ConsoleBackend, EngineConfig, FileBackend};
pub use core::{
    Backend, BackendKind, IndexRecord, LogConfig, LogLevel, LoggerError, LoggerMetrics, Record,
    Result, Session, SessionBuilder, SessionFlags, SessionInfo, TimestampFormat,
};
