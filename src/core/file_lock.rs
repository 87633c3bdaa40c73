//! Cross-process append locking
//!
//! POSIX record locks (`fcntl(F_SETLKW)`) serialize appends from independent
//! processes sharing one log file. The lock covers everything from the end
//! of file onwards, the write offset is read only once the lock is held, and
//! the release is scoped to the range starting at that offset.
//!
//! Record locks belong to the process, not the thread, so appends inside one
//! process are additionally serialized by a process-local mutex.

use parking_lot::{Mutex, MutexGuard};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicU32, Ordering};

static IN_PROCESS: Mutex<()> = parking_lot::const_mutex(());
/// Pid of the last process that went for `IN_PROCESS`, stored before locking
static LOCKER_PID: AtomicU32 = AtomicU32::new(0);

/// Release the process-local append mutex if it was inherited locked from
/// the parent across `fork`. A no-op in a process that has taken the mutex
/// itself. Only call this in a freshly forked child before any other thread
/// logs.
pub(crate) fn release_after_fork() {
    if LOCKER_PID.load(Ordering::SeqCst) != std::process::id() && IN_PROCESS.is_locked() {
        // SAFETY: after fork only the calling thread exists, so the holder
        // recorded in the inherited lock state can never release it.
        unsafe { IN_PROCESS.force_unlock() };
    }
}

fn set_lock(fd: libc::c_int, lock_type: libc::c_short, whence: libc::c_int, start: u64) -> io::Result<()> {
    // SAFETY: flock is a plain C struct; all-zero is a valid starting value.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = lock_type;
    lock.l_whence = whence as libc::c_short;
    lock.l_start = start as libc::off_t;
    lock.l_len = 0;

    loop {
        // SAFETY: fd is a valid open descriptor borrowed from a File and
        // `lock` lives for the duration of the call.
        let rval = unsafe { libc::fcntl(fd, libc::F_SETLKW, &lock as *const libc::flock) };
        if rval != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Exclusive append lock held on a log file.
///
/// Released when dropped.
pub struct AppendLock<'a> {
    file: &'a File,
    offset: u64,
    _local: MutexGuard<'static, ()>,
}

impl<'a> AppendLock<'a> {
    /// Block until the append region of `file` is exclusively locked.
    ///
    /// Interrupted waits are retried transparently.
    pub fn acquire(file: &'a File) -> io::Result<Self> {
        LOCKER_PID.store(std::process::id(), Ordering::SeqCst);
        let local = IN_PROCESS.lock();
        set_lock(file.as_raw_fd(), libc::F_WRLCK as libc::c_short, libc::SEEK_END, 0)?;
        let offset = match (&*file).seek(SeekFrom::End(0)) {
            Ok(offset) => offset,
            Err(e) => {
                let _ = set_lock(file.as_raw_fd(), libc::F_UNLCK as libc::c_short, libc::SEEK_SET, 0);
                return Err(e);
            }
        };
        Ok(Self {
            file,
            offset,
            _local: local,
        })
    }

    /// End-of-file offset observed under the lock
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file(&self) -> &File {
        self.file
    }

    /// Write the whole line at the locked end of file
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (&*self.file).write_all(data)
    }
}

impl Drop for AppendLock<'_> {
    fn drop(&mut self) {
        let _ = set_lock(
            self.file.as_raw_fd(),
            libc::F_UNLCK as libc::c_short,
            libc::SEEK_SET,
            self.offset,
        );
    }
}

/// Append `data` under the lock, handing the locked offset to `on_written`
/// before the lock is released.
pub fn locked_append<F>(file: &File, data: &[u8], on_written: F) -> io::Result<u64>
where
    F: FnOnce(&File, u64, usize),
{
    let mut lock = AppendLock::acquire(file)?;
    lock.write_all(data)?;
    let offset = lock.offset();
    on_written(lock.file(), offset, data.len());
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    fn open_append(path: &std::path::Path) -> File {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open log file")
    }

    #[test]
    fn test_offsets_follow_end_of_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("lock.log");
        let file = open_append(&path);

        let first = locked_append(&file, b"first\n", |_, _, _| {}).unwrap();
        let second = locked_append(&file, b"second\n", |_, _, _| {}).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 6);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_offset_sees_writes_through_other_descriptors() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("shared.log");
        let a = open_append(&path);
        let b = open_append(&path);

        locked_append(&a, b"from a\n", |_, _, _| {}).unwrap();
        let offset = locked_append(&b, b"from b\n", |_, _, _| {}).unwrap();

        assert_eq!(offset, 7);
    }

    #[test]
    fn test_callback_runs_under_lock_with_range() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("cb.log");
        let file = open_append(&path);
        locked_append(&file, b"0123456789\n", |_, _, _| {}).unwrap();

        let mut seen = None;
        locked_append(&file, b"abc\n", |_, offset, len| seen = Some((offset, len))).unwrap();
        assert_eq!(seen, Some((11, 4)));
    }

    #[test]
    fn test_release_after_fork_leaves_own_lock_alone() {
        let dir = tempdir().expect("Failed to create temp dir");
        let file = open_append(&dir.path().join("own.log"));

        let lock = AppendLock::acquire(&file).unwrap();
        release_after_fork();
        assert!(IN_PROCESS.is_locked());
        // Still ours: dropping the guard must not find it already released.
        drop(lock);
    }
}
