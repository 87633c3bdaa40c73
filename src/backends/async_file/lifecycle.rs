//! Process-wide engine registry
//!
//! Sessions that do not carry an injected engine share one per process. It
//! starts lazily on first use, is drained at process exit, and is replaced
//! in a child process after `fork`.
//!
//! A child that forks while the parent logs asynchronously should call
//! [`reset`] right after `fork` returns. [`engine`] also notices an engine
//! inherited from another process and replaces it on its own.

use super::engine::{AsyncEngine, EngineConfig};
use crate::core::file_lock;
use crate::core::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};

static ENGINE: Mutex<Option<Arc<AsyncEngine>>> = parking_lot::const_mutex(None);
/// Pid of the process that last took the registry lock
static REGISTRY_PID: AtomicU32 = AtomicU32::new(0);
static EXIT_HOOK: Once = Once::new();

fn registry() -> parking_lot::MutexGuard<'static, Option<Arc<AsyncEngine>>> {
    let guard = ENGINE.lock();
    REGISTRY_PID.store(std::process::id(), Ordering::Relaxed);
    guard
}

extern "C" fn drain_at_exit() {
    shutdown();
}

fn register_exit_hook() {
    EXIT_HOOK.call_once(|| {
        // SAFETY: `drain_at_exit` is a plain `extern "C" fn()` with no
        // captured state.
        let rc = unsafe { libc::atexit(drain_at_exit) };
        if rc != 0 {
            tracing::warn!("could not register exit hook; queued lines may be lost at exit");
        }
    });
}

/// Drop an engine that belongs to another process without touching its
/// worker or waiting on its items
fn abandon(engine: Arc<AsyncEngine>) {
    tracing::debug!(parent = engine.pid(), "discarding engine inherited across fork");
    std::mem::forget(engine);
    file_lock::release_after_fork();
}

/// Start the process-wide engine with `config` unless one is already running
pub fn init(config: EngineConfig) -> Result<Arc<AsyncEngine>> {
    let mut slot = registry();
    if let Some(engine) = slot.as_ref() {
        if engine.is_current_process() && engine.is_running() {
            return Ok(Arc::clone(engine));
        }
    }
    if let Some(stale) = slot.take() {
        if stale.is_current_process() {
            drop(stale);
        } else {
            abandon(stale);
        }
    }

    let engine = AsyncEngine::start(config)?;
    register_exit_hook();
    *slot = Some(Arc::clone(&engine));
    Ok(engine)
}

/// The process-wide engine, started with the default configuration on
/// first use
pub fn engine() -> Result<Arc<AsyncEngine>> {
    init(EngineConfig::default())
}

pub fn is_initialized() -> bool {
    registry()
        .as_ref()
        .is_some_and(|engine| engine.is_current_process() && engine.is_running())
}

/// Drain and stop the process-wide engine. The next [`engine`] call starts a
/// new one.
pub fn shutdown() {
    let engine = registry().take();
    if let Some(engine) = engine {
        if engine.is_current_process() {
            engine.shutdown();
        } else {
            abandon(engine);
        }
    }
}

/// Forget the engine inherited from the parent after `fork`.
///
/// Also frees the append lock if a parent thread held it at the time of the
/// fork. In a process that never forked the engine is shut down normally.
pub fn reset() {
    file_lock::release_after_fork();
    let inherited = REGISTRY_PID.load(Ordering::Relaxed) != std::process::id();
    if inherited && ENGINE.is_locked() {
        // The parent forked while one of its threads held the registry.
        // SAFETY: only the forking thread exists in the child, so the guard
        // that locked it can never be dropped here.
        unsafe { ENGINE.force_unlock() };
    }
    shutdown();
}
