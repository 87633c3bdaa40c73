//! Integration tests for the session logger
//!
//! These tests verify:
//! - Asynchronous writes drain in order on shutdown
//! - Index records locate each session's lines in a shared file
//! - Sessions sharing a file never interleave within a line
//! - Synchronous and asynchronous writers agree on the file format
//! - Configuration selects the backend

use rust_session_logger::core::index::{lines_for, read_index};
use rust_session_logger::prelude::*;
use rust_session_logger::{slog_err, slog_info, slog_iwrite};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn async_config(log_file: &Path, index_dir: &Path) -> LogConfig {
    LogConfig::default()
        .with_path(log_file)
        .with_index_dir(index_dir)
        .with_backend(BackendKind::LogfileAsync)
}

fn body(line: &str) -> &str {
    line.split_once(": ").map_or(line, |(_, rest)| rest)
}

#[test]
fn test_async_session_end_to_end() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("sip.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    let session = Session::builder("b2bua")
        .call_id("call-1@host")
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .expect("Failed to open session");
    assert_eq!(session.backend_name(), "logfile_async");

    slog_info!(session, "INVITE received");
    slog_err!(session, "no route for {}", "+15551234");
    session.close();
    engine.shutdown();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("/call-1@host/b2bua: INVITE received"));
    assert!(lines[1].ends_with("/call-1@host/b2bua: no route for +15551234"));
    assert_eq!(engine.metrics().total_written(), 2);
    assert_eq!(engine.metrics().dropped_count(), 0);
}

#[test]
fn test_index_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("indexed.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    let session = Session::builder("proxy")
        .call_id("S")
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .unwrap();
    slog_info!(session, "first");
    slog_info!(session, "second");
    session.close();
    engine.shutdown();

    let records = read_index(temp_dir.path(), &log_file).expect("Failed to read index");
    assert_eq!(records.len(), 2);

    let mut file = File::open(&log_file).unwrap();
    let first = String::from_utf8(records[0].extract(&mut file).unwrap()).unwrap();
    let second = String::from_utf8(records[1].extract(&mut file).unwrap()).unwrap();
    assert!(first.ends_with("/S/proxy: first\n"));
    assert!(second.ends_with("/S/proxy: second\n"));
    assert_eq!(records[0].offset, 0);
    assert_eq!(records[1].offset, records[0].length);
}

#[test]
fn test_global_session_is_not_indexed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("global.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    let session = Session::builder("registrar")
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .unwrap();
    slog_info!(session, "startup");
    slog_iwrite!(session, LogLevel::Info, "reg-77", "binding refreshed");
    session.close();
    engine.shutdown();

    let content = fs::read_to_string(&log_file).unwrap();
    assert!(content.contains("/GLOBAL/registrar: startup\n"));

    // Only the explicitly indexed line has a record.
    let records = read_index(temp_dir.path(), &log_file).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity, "reg-77");
    let lines = lines_for(temp_dir.path(), &log_file, "reg-77").unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("/GLOBAL/registrar: binding refreshed\n"));
}

#[test]
fn test_sessions_sharing_a_file_keep_their_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("shared.log");
    let engine = AsyncEngine::start(EngineConfig::default().with_pool_capacity(16)).unwrap();

    const MESSAGES: usize = 200;
    let mut handles = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let session = Session::builder("uas")
            .call_id(name)
            .config(async_config(&log_file, temp_dir.path()))
            .engine(Arc::clone(&engine))
            .open()
            .unwrap();
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..MESSAGES {
                // Wait for a free item rather than lose the message.
                while engine.available() == 0 {
                    thread::yield_now();
                }
                slog_info!(session, "{} message {}", name, i);
            }
            session.close();
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    engine.shutdown();

    let written = engine.metrics().total_written() as usize;
    let dropped = engine.metrics().dropped_count() as usize;
    assert_eq!(written + dropped, 3 * MESSAGES);

    for name in ["alpha", "beta", "gamma"] {
        let lines = lines_for(temp_dir.path(), &log_file, name).unwrap();
        let numbers: Vec<usize> = lines
            .iter()
            .map(|line| {
                assert!(line.ends_with('\n'));
                let text = body(line.trim_end());
                let prefix = format!("{} message ", name);
                text.strip_prefix(prefix.as_str())
                    .expect("line from another session at this offset")
                    .parse()
                    .unwrap()
            })
            .collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]), "{} out of order", name);
    }

    let content = fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), written);
}

#[test]
fn test_sync_and_async_writers_share_a_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("mixed.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    let async_session = Session::builder("worker")
        .call_id("a")
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .unwrap();
    let sync_session = Session::builder("worker")
        .call_id("s")
        .config(async_config(&log_file, temp_dir.path()).with_backend(BackendKind::Logfile))
        .open()
        .unwrap();
    assert_eq!(sync_session.backend_name(), "logfile");

    for i in 0..20 {
        slog_info!(async_session, "async {}", i);
        slog_info!(sync_session, "sync {}", i);
    }
    async_session.close();
    sync_session.close();
    engine.shutdown();

    let content = fs::read_to_string(&log_file).unwrap();
    let total = content.lines().count() as u64;
    assert_eq!(total, 20 + engine.metrics().total_written());
    for line in content.lines() {
        assert!(line.contains("/a/worker: async ") || line.contains("/s/worker: sync "));
    }
    assert_eq!(lines_for(temp_dir.path(), &log_file, "s").unwrap().len(), 20);
}

#[test]
fn test_reopen_session_creates_file_lazily() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("lazy.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    let session = Session::builder("cdr")
        .call_id("c")
        .flags(SessionFlags::REOPEN)
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .unwrap();
    // Nothing is queued until the first write.
    assert_eq!(engine.available(), engine.config().pool_capacity);
    assert!(!log_file.exists());

    slog_info!(session, "record written");
    session.close();
    engine.shutdown();

    assert!(fs::read_to_string(&log_file).unwrap().ends_with("/c/cdr: record written\n"));
}

#[test]
fn test_open_failure_leaves_session_silent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("no/such/dir/sip.log");
    let engine = AsyncEngine::start(EngineConfig::default()).unwrap();

    // The open is queued, so the failure only shows in the counters.
    let session = Session::builder("app")
        .config(async_config(&log_file, temp_dir.path()))
        .engine(Arc::clone(&engine))
        .open()
        .expect("async open is queued");
    slog_info!(session, "goes nowhere");
    session.close();
    engine.shutdown();

    assert_eq!(engine.metrics().unwritable_count(), 1);
    assert_eq!(engine.metrics().total_written(), 0);
}

#[test]
fn test_config_from_json_selects_backend() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("json.log");
    let json = format!(
        r#"{{"path": {:?}, "level": "Warn", "backend": "logfile", "index_dir": null}}"#,
        log_file.to_str().unwrap()
    );
    let config = LogConfig::from_json(&json).expect("Failed to parse config");
    assert_eq!(config.backend, BackendKind::Logfile);

    let session = Session::builder("json").config(config).open().unwrap();
    slog_info!(session, "below threshold");
    slog_err!(session, "kept");
    session.close();

    let content = fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.ends_with("/GLOBAL/json: kept\n"));
}

#[test]
fn test_custom_timestamp_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("ts.log");
    let config = LogConfig::default()
        .with_path(&log_file)
        .with_backend(BackendKind::Logfile)
        .without_index()
        .with_timestamp_format(TimestampFormat::Custom("%Y".to_string()));

    let session = Session::builder("ts").config(config).open().unwrap();
    slog_info!(session, "stamped");
    session.close();

    let content = fs::read_to_string(&log_file).unwrap();
    let (year, rest) = content.split_once('/').unwrap();
    assert_eq!(year.len(), 4);
    assert!(year.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(rest, "GLOBAL/ts: stamped\n");
}
