//! Core session logger types and traits

pub mod backend;
pub mod config;
pub mod encoder;
pub mod error;
pub mod file_lock;
pub mod index;
pub mod log_level;
pub mod metrics;
pub mod session;
pub mod timestamp;

pub use backend::{Backend, Record};
pub use config::{BackendKind, LogConfig};
pub use encoder::{encode_line, BoundedWriter, Encoded, LineParts};
pub use error::{LoggerError, Result};
pub use index::{read_index, IndexRecord, IndexWriter};
pub use log_level::LogLevel;
pub use metrics::LoggerMetrics;
pub use session::{Session, SessionBuilder, SessionFlags, SessionInfo, GLOBAL_IDENTITY};
pub use timestamp::TimestampFormat;
