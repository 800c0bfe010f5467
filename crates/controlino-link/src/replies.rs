use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use controlino_frame::StringPacket;
use tracing::warn;

/// Bounded hand-off of string replies from the decode loop to a waiting
/// synchronous command.
///
/// The protocol carries no request ids, so any reply satisfies any waiter.
/// Callers must not have more than one synchronous command in flight per
/// controller; [`Controller`](crate::Controller) enforces this.
#[derive(Debug)]
pub struct ReplyQueue {
    entries: Mutex<VecDeque<StringPacket>>,
    ready: Condvar,
    capacity: usize,
}

impl ReplyQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Queue a reply. Never blocks: when the queue is full the oldest
    /// unclaimed reply is dropped.
    pub fn enqueue(&self, reply: StringPacket) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            if let Some(stale) = entries.pop_front() {
                warn!(
                    dropped = %stale.text,
                    capacity = self.capacity,
                    "reply queue full, dropping oldest reply"
                );
            }
        }
        entries.push_back(reply);
        drop(entries);
        self.ready.notify_one();
    }

    /// Take the oldest reply, waiting up to `timeout` for one to arrive.
    ///
    /// `None` means no reply arrived in time.
    pub fn await_reply(&self, timeout: Duration) -> Option<StringPacket> {
        let deadline = Instant::now() + timeout;
        let mut entries = self.lock();
        loop {
            if let Some(reply) = entries.pop_front() {
                return Some(reply);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .ready
                .wait_timeout(entries, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            entries = guard;
        }
    }

    /// Take the oldest reply without waiting.
    pub fn try_take(&self) -> Option<StringPacket> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every unclaimed reply.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<StringPacket>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REPLY_QUEUE_CAPACITY)
    }
}
