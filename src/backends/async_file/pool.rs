//! Fixed-capacity work-item pool
//!
//! All items are allocated when the engine starts and recycled for the
//! lifetime of the engine, so the write path never allocates. Items are
//! addressed by slot index; a [`SlotId`] is a move-only token, and whoever
//! holds it (free list, submission queue or worker) owns the slot.

use super::queue::SubmissionQueue;
use crate::core::{LoggerMetrics, SessionInfo};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;

/// What the worker should do with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Write,
    Close,
    /// Open, write and close as one unit, for reopen-per-write sessions
    OpenWriteClose,
    Exit,
}

/// Where the index record for a write comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexTag {
    None,
    /// The session's own identity
    Session,
    /// The first `n` bytes of the item's index buffer
    Custom(usize),
}

pub(crate) struct WorkItem {
    pub(crate) op: Operation,
    pub(crate) session: Option<Arc<SessionInfo>>,
    pub(crate) data: Box<[u8]>,
    pub(crate) len: usize,
    pub(crate) index_tag: IndexTag,
    pub(crate) index_buf: Box<[u8]>,
}

impl WorkItem {
    fn new(item_capacity: usize, index_capacity: usize) -> Self {
        Self {
            op: Operation::Exit,
            session: None,
            data: vec![0u8; item_capacity].into_boxed_slice(),
            len: 0,
            index_tag: IndexTag::None,
            index_buf: vec![0u8; index_capacity].into_boxed_slice(),
        }
    }

    pub(crate) fn line(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub(crate) fn index_id(&self) -> Option<&str> {
        match self.index_tag {
            IndexTag::None => None,
            IndexTag::Session => self.session.as_deref().map(SessionInfo::call_id),
            IndexTag::Custom(n) => std::str::from_utf8(&self.index_buf[..n]).ok(),
        }
    }

    /// Store an explicit index id; ids that do not fit are not indexed
    pub(crate) fn set_custom_index(&mut self, id: &str) -> bool {
        let bytes = id.as_bytes();
        if bytes.len() > self.index_buf.len() {
            self.index_tag = IndexTag::None;
            return false;
        }
        self.index_buf[..bytes.len()].copy_from_slice(bytes);
        self.index_tag = IndexTag::Custom(bytes.len());
        true
    }

    /// Forget the previous use. Drops the session reference, which for a
    /// closed session is the last one.
    pub(crate) fn reset(&mut self) {
        self.op = Operation::Exit;
        self.session = None;
        self.len = 0;
        self.index_tag = IndexTag::None;
    }
}

/// Exclusive claim on one pool slot
#[derive(Debug, PartialEq, Eq)]
pub struct SlotId(usize);

impl SlotId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How `acquire` behaves when the pool is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Give up at once and count the message as dropped
    NoWait,
    /// Block until an item is released
    Wait,
}

struct FreeList {
    slots: Vec<SlotId>,
    closed: bool,
}

pub struct WorkPool {
    items: Box<[Mutex<WorkItem>]>,
    free: Mutex<FreeList>,
    freed: Condvar,
    metrics: Arc<LoggerMetrics>,
}

impl WorkPool {
    pub(crate) fn new(capacity: usize, item_capacity: usize, index_capacity: usize, metrics: Arc<LoggerMetrics>) -> Self {
        let items = (0..capacity)
            .map(|_| Mutex::new(WorkItem::new(item_capacity, index_capacity)))
            .collect();
        // Reversed so that slot 0 is handed out first.
        let slots = (0..capacity).rev().map(SlotId).collect();
        Self {
            items,
            free: Mutex::new(FreeList { slots, closed: false }),
            freed: Condvar::new(),
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn available(&self) -> usize {
        self.free.lock().slots.len()
    }

    /// Take a free item.
    ///
    /// `NoWait` returns `None` immediately when the pool is empty and bumps
    /// the dropped counter. `Wait` blocks until an item is released and only
    /// returns `None` once the pool has been closed.
    pub fn acquire(&self, mode: Acquire) -> Option<SlotId> {
        let mut free = self.free.lock();
        let mut blocked = false;
        loop {
            if let Some(slot) = free.slots.pop() {
                return Some(slot);
            }
            match mode {
                Acquire::NoWait => {
                    self.metrics.record_dropped();
                    return None;
                }
                Acquire::Wait if free.closed => return None,
                Acquire::Wait => {
                    if !blocked {
                        blocked = true;
                        self.metrics.record_block();
                    }
                    self.freed.wait(&mut free);
                }
            }
        }
    }

    /// Like `acquire(Acquire::Wait)` but gives up after `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<SlotId> {
        let mut free = self.free.lock();
        if free.slots.is_empty() && !free.closed {
            self.metrics.record_block();
            let deadline = std::time::Instant::now() + timeout;
            while free.slots.is_empty() && !free.closed {
                if self.freed.wait_until(&mut free, deadline).timed_out() {
                    break;
                }
            }
        }
        free.slots.pop()
    }

    /// Return an item to the free list and wake one blocked acquirer
    pub fn release(&self, slot: SlotId) {
        let mut free = self.free.lock();
        free.slots.push(slot);
        drop(free);
        self.freed.notify_one();
    }

    /// Fail every current and future blocking acquire once the pool is empty
    pub(crate) fn close(&self) {
        self.free.lock().closed = true;
        self.freed.notify_all();
    }

    pub(crate) fn item(&self, slot: &SlotId) -> MutexGuard<'_, WorkItem> {
        self.items[slot.0].lock()
    }

    /// Fill the item behind `slot` and hand it to the worker
    pub(crate) fn submit<F>(&self, queue: &SubmissionQueue, slot: SlotId, fill: F)
    where
        F: FnOnce(&mut WorkItem),
    {
        {
            let mut item = self.item(&slot);
            item.reset();
            fill(&mut item);
        }
        queue.push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn pool(capacity: usize) -> (WorkPool, Arc<LoggerMetrics>) {
        let metrics = Arc::new(LoggerMetrics::new());
        (WorkPool::new(capacity, 64, 16, Arc::clone(&metrics)), metrics)
    }

    #[test]
    fn test_exhaustion_drops_exactly_one() {
        let (pool, metrics) = pool(4);
        let held: Vec<SlotId> = (0..4).map(|_| pool.acquire(Acquire::NoWait).unwrap()).collect();
        assert_eq!(pool.available(), 0);

        assert!(pool.acquire(Acquire::NoWait).is_none());
        assert_eq!(metrics.dropped_count(), 1);

        for slot in held {
            pool.release(slot);
        }
        assert_eq!(pool.available(), 4);
        assert_eq!(metrics.dropped_count(), 1);
    }

    #[test]
    fn test_slots_are_distinct() {
        let (pool, _) = pool(8);
        let mut seen: Vec<usize> = (0..8)
            .map(|_| pool.acquire(Acquire::NoWait).unwrap().index())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_blocking_acquire_wakes_on_release() {
        let (pool, metrics) = pool(1);
        let pool = Arc::new(pool);
        let held = pool.acquire(Acquire::NoWait).unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let start = Instant::now();
                let slot = pool.acquire(Acquire::Wait);
                (slot.is_some(), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(100));
        pool.release(held);

        let (got, waited) = waiter.join().unwrap();
        assert!(got);
        assert!(waited >= Duration::from_millis(50));
        assert_eq!(metrics.block_events(), 1);
        assert_eq!(metrics.dropped_count(), 0);
    }

    #[test]
    fn test_close_releases_blocked_acquirer() {
        let (pool, _) = pool(1);
        let pool = Arc::new(pool);
        let _held = pool.acquire(Acquire::NoWait).unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire(Acquire::Wait).is_none())
        };
        thread::sleep(Duration::from_millis(50));
        pool.close();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let (pool, _) = pool(1);
        let _held = pool.acquire(Acquire::NoWait).unwrap();
        let start = Instant::now();
        assert!(pool.acquire_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_custom_index_id() {
        let mut item = WorkItem::new(16, 8);
        assert!(item.set_custom_index("abc"));
        assert_eq!(item.index_id(), Some("abc"));
        assert!(!item.set_custom_index("much-too-long"));
        assert_eq!(item.index_id(), None);
        item.reset();
        assert_eq!(item.index_id(), None);
    }
}
