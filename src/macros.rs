//! Logging macros for ergonomic session logging.
//!
//! These wrap [`format_args!`], so nothing is formatted for messages below
//! the session's threshold and the asynchronous backend renders straight
//! into its work item.
//!
//! # Examples
//!
//! ```
//! use rust_session_logger::prelude::*;
//! use rust_session_logger::{slog_info, slog_warn};
//!
//! let session = Session::builder("proxy")
//!     .call_id("abc@host")
//!     .config(LogConfig::default().with_backend(BackendKind::Stderr))
//!     .open()
//!     .unwrap();
//!
//! // Basic logging
//! slog_info!(session, "Server started");
//!
//! // With format arguments
//! let port = 5060;
//! slog_warn!(session, "Retransmitting on port {}", port);
//! ```

/// Log a message at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_session_logger::prelude::*;
/// # let session = Session::builder("app").config(LogConfig::default()).open().unwrap();
/// use rust_session_logger::slog;
/// slog!(session, LogLevel::Info, "Simple message");
/// slog!(session, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! slog {
    ($session:expr, $level:expr, $($arg:tt)+) => {
        $session.write($level, format_args!($($arg)+))
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! slog_debug {
    ($session:expr, $($arg:tt)+) => {
        $crate::slog!($session, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! slog_info {
    ($session:expr, $($arg:tt)+) => {
        $crate::slog!($session, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! slog_warn {
    ($session:expr, $($arg:tt)+) => {
        $crate::slog!($session, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! slog_err {
    ($session:expr, $($arg:tt)+) => {
        $crate::slog!($session, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! slog_crit {
    ($session:expr, $($arg:tt)+) => {
        $crate::slog!($session, $crate::LogLevel::Critical, $($arg)+)
    };
}

/// Log a message followed by `: <error>`.
///
/// # Examples
///
/// ```
/// # use rust_session_logger::prelude::*;
/// # let session = Session::builder("app").config(LogConfig::default()).open().unwrap();
/// use rust_session_logger::slog_ewrite;
/// let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "no answer");
/// slog_ewrite!(session, LogLevel::Error, err, "OPTIONS to {}", "10.0.0.2");
/// ```
#[macro_export]
macro_rules! slog_ewrite {
    ($session:expr, $level:expr, $error:expr, $($arg:tt)+) => {
        $session.ewrite($level, &$error, format_args!($($arg)+))
    };
}

/// Log a message indexed under an explicit id.
#[macro_export]
macro_rules! slog_iwrite {
    ($session:expr, $level:expr, $index_id:expr, $($arg:tt)+) => {
        $session.iwrite($level, $index_id, format_args!($($arg)+))
    };
}
