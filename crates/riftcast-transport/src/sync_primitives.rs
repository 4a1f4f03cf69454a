//! Small condvar-backed primitives shared by the pipeline stages:
//! condvar-bounded blocking points, one mutex per shared resource, no
//! lock held across an external call.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Latest-wins single slot, used for the Decode→Render handoff: always
/// holds the freshest available frame, older pending frames are
/// discarded.
pub struct SingleSlot<T> {
    value: Mutex<Option<T>>,
    cv: Condvar,
}

impl<T> Default for SingleSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleSlot<T> {
    pub fn new() -> Self {
        Self { value: Mutex::new(None), cv: Condvar::new() }
    }

    /// Overwrites whatever was pending, per latest-wins semantics.
    pub fn set(&self, item: T) {
        let mut guard = self.value.lock().expect("single slot mutex poisoned");
        *guard = Some(item);
        self.cv.notify_one();
    }

    /// Waits up to `timeout` for a value, then takes whatever is present
    /// (possibly `None` if nothing arrived before the deadline).
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        let guard = self.value.lock().expect("single slot mutex poisoned");
        let (mut guard, _) = self
        .cv
        .wait_timeout(guard, timeout)
        .expect("single slot condvar wait poisoned");
        guard.take()
    }

    pub fn notify_all(&self) {
        self.cv.notify_all();
    }
}

/// Bounded FIFO queue for decoded-audio items, used for the audio
/// playback stage.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    cv: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: Mutex::new(VecDeque::with_capacity(capacity)), cv: Condvar::new(), capacity }
    }

    /// Pushes an item, dropping the oldest if the queue is already at
    /// capacity (bounded memory over perfect delivery — audio loss
    /// concealment is the Audio stage's job, not this queue's).
    pub fn push(&self, item: T) {
        let mut guard = self.items.lock().expect("audio queue mutex poisoned");
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(item);
        self.cv.notify_one();
    }

    pub fn wait_pop(&self, timeout: Duration) -> Option<T> {
        let guard = self.items.lock().expect("audio queue mutex poisoned");
        let (mut guard, _) = self
        .cv
        .wait_timeout(guard, timeout)
        .expect("audio queue condvar wait poisoned");
        guard.pop_front()
    }

    pub fn notify_all(&self) {
        self.cv.notify_all();
    }
}

/// Pairs a jitter buffer with the condvar the Decode stage waits on, since
/// `riftcast_jitter::JitterBuffer` is deliberately not self-locking (its own
/// doc comment: the caller wraps one instance in a mutex).
pub struct JitterSlot {
    pub buffer: Mutex<riftcast_jitter::JitterBuffer>,
    pub cv: Condvar,
}

impl JitterSlot {
    pub fn new(target_depth_ms: u32) -> Self {
        Self { buffer: Mutex::new(riftcast_jitter::JitterBuffer::new(target_depth_ms)), cv: Condvar::new() }
    }
}
