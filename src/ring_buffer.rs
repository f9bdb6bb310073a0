// src/ring_buffer.rs
//
// Bounded circular byte buffer shared between the serial ingestion path
// and the periodic drain path. One byte slot is always kept empty so a
// full buffer is distinguishable from an empty one.

use std::sync::Mutex;

/// Fixed-capacity ring buffer over raw bytes.
///
/// Every operation takes the internal lock for its whole duration and
/// never blocks waiting for space or data: writers fail fast when the
/// payload does not fit, readers fail fast when asked for more than is
/// buffered.
pub struct RingBuffer {
    inner: Mutex<RingInner>,
    capacity: usize,
}

struct RingInner {
    storage: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl RingInner {
    fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            self.storage.len() - self.head + self.tail
        }
    }

    fn free_space(&self) -> usize {
        // One slot stays empty to disambiguate full vs empty.
        self.storage.len() - self.len() - 1
    }
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring buffer needs at least 2 bytes of capacity");
        Self {
            inner: Mutex::new(RingInner {
                storage: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `data` at the tail, wrapping at capacity.
    /// All-or-nothing: returns `false` without touching the buffer when
    /// `data` is larger than the current free space.
    pub fn write(&self, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }

        let mut inner = self.inner.lock().expect("ring buffer lock poisoned");
        if data.len() > inner.free_space() {
            return false;
        }

        let capacity = inner.storage.len();
        let tail = inner.tail;
        let tail_space = capacity - tail;
        if data.len() <= tail_space {
            inner.storage[tail..tail + data.len()].copy_from_slice(data);
        } else {
            inner.storage[tail..].copy_from_slice(&data[..tail_space]);
            inner.storage[..data.len() - tail_space].copy_from_slice(&data[tail_space..]);
        }
        inner.tail = (tail + data.len()) % capacity;
        true
    }

    /// Consume and return `len` bytes from the head, or `None` when fewer
    /// than `len` bytes are buffered.
    pub fn read(&self, len: usize) -> Option<Vec<u8>> {
        if len == 0 {
            return Some(Vec::new());
        }

        let mut inner = self.inner.lock().expect("ring buffer lock poisoned");
        if len > inner.len() {
            return None;
        }

        let capacity = inner.storage.len();
        let head = inner.head;
        let mut out = vec![0u8; len];
        if head + len <= capacity {
            out.copy_from_slice(&inner.storage[head..head + len]);
        } else {
            let first = capacity - head;
            out[..first].copy_from_slice(&inner.storage[head..]);
            out[first..].copy_from_slice(&inner.storage[..len - first]);
        }
        inner.head = (head + len) % capacity;
        Some(out)
    }

    /// Read the byte at `head + offset` without consuming it.
    /// Returns 0 when the buffer is empty; callers that care must check
    /// `len()` first. Intended for monitoring code, not correctness-critical
    /// paths, hence the non-panicking sentinel.
    pub fn peek(&self, offset: usize) -> u8 {
        let inner = self.inner.lock().expect("ring buffer lock poisoned");
        if inner.len() == 0 {
            return 0;
        }
        let pos = (inner.head + offset) % inner.storage.len();
        inner.storage[pos]
    }

    /// Discard up to `len` bytes from the head. Used for overflow recovery.
    pub fn skip(&self, len: usize) {
        let mut inner = self.inner.lock().expect("ring buffer lock poisoned");
        let available = inner.len();
        if available == 0 {
            return;
        }
        let advance = len.min(available);
        inner.head = (inner.head + advance) % inner.storage.len();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ring buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_space(&self) -> usize {
        self.inner
            .lock()
            .expect("ring buffer lock poisoned")
            .free_space()
    }

    /// Reset head and tail; the buffer is empty afterwards.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("ring buffer lock poisoned");
        inner.head = 0;
        inner.tail = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================
