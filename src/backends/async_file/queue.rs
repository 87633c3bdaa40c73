//! Submission queue between producers and the worker
//!
//! A FIFO channel of slot tokens. Every token comes from the pool, so a
//! channel sized to the pool capacity can never fill up and `push` never
//! waits.

use super::pool::SlotId;
use crossbeam_channel::{bounded, Receiver, Sender};

pub struct SubmissionQueue {
    sender: Sender<SlotId>,
    receiver: Receiver<SlotId>,
}

impl SubmissionQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Append at the tail and wake the worker
    pub fn push(&self, slot: SlotId) {
        // The receiver lives as long as self, so the channel cannot be
        // disconnected here.
        let _ = self.sender.send(slot);
    }

    /// Block until the head item is available
    pub fn pop(&self) -> Option<SlotId> {
        self.receiver.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
