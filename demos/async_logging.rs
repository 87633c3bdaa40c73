//! Async logging example
//!
//! Several call sessions log into one shared file through the asynchronous
//! backend, then one session's lines are pulled back out through the index.
//!
//! Run with: cargo run --example async_logging

use rust_session_logger::core::index::lines_for;
use rust_session_logger::prelude::*;
use rust_session_logger::{slog_ewrite, slog_info, slog_warn};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Session Logger - Async Logging Example ===\n");

    let dir = std::env::temp_dir().join(format!("session-logger-demo-{}", std::process::id()));
    let index_dir = dir.join("idx");
    std::fs::create_dir_all(&index_dir)?;
    let log_file: PathBuf = dir.join("sip.log");

    let config = LogConfig::default()
        .with_path(&log_file)
        .with_index_dir(&index_dir)
        .with_backend(BackendKind::LogfileAsync);

    println!("1. Multi-session logging:");

    let mut handles = vec![];
    for call in 0..5 {
        let session = Session::builder("demo")
            .call_id(format!("call-{}@10.0.0.1", call))
            .config(config.clone())
            .open()?;
        let handle = thread::spawn(move || {
            for i in 0..20 {
                slog_info!(session, "call {} - message {}", call, i);
                thread::sleep(Duration::from_millis(2));
            }
            let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "no ACK");
            slog_ewrite!(session, LogLevel::Warn, err, "call {} ending", call);
            session.close();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("logging thread panicked");
    }
    println!("   5 sessions logged 21 messages each");

    let global = Session::builder("demo").config(config.clone()).open()?;
    slog_warn!(global, "global sessions are never indexed");
    global.close();

    // Drain the worker so everything is on disk.
    let engine = lifecycle::engine()?;
    lifecycle::shutdown();
    let metrics = engine.metrics();

    println!("\n2. Metrics:");
    println!("   written:   {}", metrics.total_written());
    println!("   dropped:   {}", metrics.dropped_count());
    println!("   truncated: {}", metrics.truncated_count());

    println!("\n3. Lines of call-3 from the index:");
    for line in lines_for(&index_dir, &log_file, "call-3@10.0.0.1")? {
        print!("   {}", line);
    }

    println!("\n=== Example completed successfully! ===");
    println!("Check '{}' for file output", log_file.display());

    Ok(())
}
