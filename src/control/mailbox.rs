//! Single-slot mailboxes
//!
//! Each mailbox holds at most one pending value. Posting replaces whatever
//! is waiting, so the reader only ever sees the latest value and never a
//! backlog.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Latest-value-wins conduit between one writer and one reader
pub struct Mailbox<T> {
    slot: Arc<ArrayQueue<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(ArrayQueue::new(1)),
        }
    }

    /// Post a value, discarding any value not yet taken
    pub fn post(&self, value: T) {
        let _ = self.slot.force_push(value);
    }

    /// Take the pending value, if any. Never blocks.
    pub fn take(&self) -> Option<T> {
        self.slot.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative stop request shared between the owner and the worker
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
