//! Backend implementations

pub mod async_file;
pub mod console;
pub mod file;

pub use async_file::{lifecycle, AsyncEngine, AsyncFileBackend, EngineConfig};
pub use console::ConsoleBackend;
pub use file::FileBackend;

// Re-export the trait for implementors
pub use crate::core::Backend;
