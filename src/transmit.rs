// src/transmit.rs
//
// Outbound transmit queue.
// Serializes writes from any number of producers into one FIFO so payloads
// reach the port whole and in submission order. Ordering relative to
// connection state changes is not guaranteed; a write that races a close is
// dropped by the worker with an Info notification.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::io::serial::worker::PortWriter;
use crate::logging::tlog;

struct TransmitState {
    queue: VecDeque<Vec<u8>>,
    /// True while a drain task is alive. The task resets this itself when
    /// it finds the queue empty, so at most one drain runs at a time.
    draining: bool,
}

struct TransmitInner {
    writer: PortWriter,
    state: Mutex<TransmitState>,
    tx_bytes: AtomicU64,
    dropped_payloads: AtomicU64,
}

/// FIFO write queue in front of a [`PortWriter`].
///
/// `enqueue` never blocks: payloads are appended under a short lock and a
/// background task dispatches them one per scheduling turn, yielding between
/// sends so producers are never starved.
#[derive(Clone)]
pub struct TransmitQueue {
    inner: Arc<TransmitInner>,
}

impl TransmitQueue {
    pub fn new(writer: PortWriter) -> Self {
        Self {
            inner: Arc::new(TransmitInner {
                writer,
                state: Mutex::new(TransmitState {
                    queue: VecDeque::new(),
                    draining: false,
                }),
                tx_bytes: AtomicU64::new(0),
                dropped_payloads: AtomicU64::new(0),
            }),
        }
    }

    /// Append one payload and make sure a drain task is running.
    /// Must be called inside a tokio runtime.
    pub fn enqueue(&self, data: Vec<u8>) {
        // Byte accounting happens at submission time, not dispatch time.
        self.inner
            .tx_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        let start_drain = {
            let mut state = self.inner.state.lock().expect("transmit lock poisoned");
            state.queue.push_back(data);
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                drain(inner).await;
            });
        }
    }

    /// Discard all queued payloads that have not yet been dispatched.
    /// A payload already handed to the writer is not recalled.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().expect("transmit lock poisoned");
        let dropped = state.queue.len();
        state.queue.clear();
        if dropped > 0 {
            tlog!("[transmit] Cleared {} pending payload(s)", dropped);
        }
    }

    /// Total bytes accepted by `enqueue` since creation. Counted at
    /// submission, so cleared or undispatched payloads are included.
    pub fn tx_bytes(&self) -> u64 {
        self.inner.tx_bytes.load(Ordering::Relaxed)
    }

    /// Payloads lost because the worker's command queue was full.
    pub fn dropped_payloads(&self) -> u64 {
        self.inner.dropped_payloads.load(Ordering::Relaxed)
    }

    /// Payloads still waiting to be dispatched.
    pub fn pending_len(&self) -> usize {
        self.inner
            .state
            .lock()
            .expect("transmit lock poisoned")
            .queue
            .len()
    }
}

/// Dispatch queued payloads one at a time until the queue is empty.
/// The lock is never held across a send or an await.
async fn drain(inner: Arc<TransmitInner>) {
    loop {
        let next = {
            let mut state = inner.state.lock().expect("transmit lock poisoned");
            match state.queue.pop_front() {
                Some(data) => data,
                None => {
                    state.draining = false;
                    return;
                }
            }
        };

        let len = next.len();
        if let Err(e) = inner.writer.send(next) {
            // Payload is lost; count it so backpressure is visible to the
            // embedding layer, and keep draining the rest.
            inner.dropped_payloads.fetch_add(1, Ordering::Relaxed);
            tlog!("[transmit] Dropped {} byte payload: {}", len, e);
        }

        // One dispatch per scheduling turn.
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
