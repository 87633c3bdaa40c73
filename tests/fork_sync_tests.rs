//! Forking while another thread appends synchronously
//!
//! Single test binary: the parent keeps a logging thread busy so that some
//! forks happen while that thread holds the process-local append lock.

use rust_session_logger::backends::lifecycle;
use rust_session_logger::prelude::*;
use rust_session_logger::slog_info;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const FORKS: usize = 200;

#[test]
fn test_child_can_append_after_reset() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("sync.log");
    let config = LogConfig::default()
        .with_path(&log_file)
        .without_index()
        .with_backend(BackendKind::Logfile);

    let spinner_session = Arc::new(
        Session::builder("fork")
            .call_id("spinner")
            .config(config.clone())
            .open()
            .expect("Failed to open session"),
    );
    let stop = Arc::new(AtomicBool::new(false));
    let spinner = {
        let session = Arc::clone(&spinner_session);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                slog_info!(session, "spinning");
            }
        })
    };

    for round in 0..FORKS {
        // SAFETY: the child only logs through this crate and leaves with
        // `_exit`, never returning into the test harness.
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0, "fork failed");

        if pid == 0 {
            // A child stuck on an inherited lock is killed instead of
            // hanging the test.
            // SAFETY: plain syscall.
            unsafe { libc::alarm(10) };
            lifecycle::reset();
            let code = match Session::builder("fork")
                .call_id("child")
                .config(config.clone())
                .open()
            {
                Ok(child) => {
                    slog_info!(child, "child {}", round);
                    child.close();
                    0
                }
                Err(_) => 1,
            };
            // SAFETY: leaves the child without running the parent's exit hooks.
            unsafe { libc::_exit(code) };
        }

        let mut status = 0;
        // SAFETY: `pid` is our direct child.
        let waited = unsafe { libc::waitpid(pid, &mut status, 0) };
        assert_eq!(waited, pid);
        assert!(
            libc::WIFEXITED(status),
            "child {} did not exit normally (status {:#x})",
            round,
            status
        );
        assert_eq!(libc::WEXITSTATUS(status), 0, "child {} failed to open", round);
    }

    stop.store(true, Ordering::Relaxed);
    spinner.join().expect("Thread panicked");

    let content = fs::read_to_string(&log_file).unwrap();
    let children = content
        .lines()
        .filter(|l| l.contains("/child/fork: child "))
        .count();
    assert_eq!(children, FORKS);
    for line in content.lines() {
        assert!(
            line.ends_with("/spinner/fork: spinning") || line.contains("/child/fork: child "),
            "{}",
            line
        );
    }
}
