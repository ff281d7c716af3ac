//! Per-thread debounced FIFO buffering of inbound messages.
//!
//! Decouples the rate and shape of inbound delivery from the rate of turn
//! execution: bursts that arrive within a quiet window coalesce into one
//! settle notification instead of one turn per message. Debounce, not
//! throttle — every enqueue pushes the deadline out to `debounce` after the
//! *last* arrival.
//!
//! Messages are opaque to the buffer; it only guarantees FIFO order, with
//! batch-internal order preserved for a single multi-message enqueue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use parley_types::ThreadId;

struct BufferRecord<M> {
    /// Insertion order is arrival order.
    queue: VecDeque<M>,
    /// Cancellable scheduled settle notification.
    timer: Option<JoinHandle<()>>,
    /// Bumped per enqueue; a fired timer only notifies when its captured
    /// epoch is still current. Guards the abort/fire race where a timer has
    /// already woken but not yet taken the state lock.
    epoch: u64,
}

impl<M> Default for BufferRecord<M> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            timer: None,
            epoch: 0,
        }
    }
}

struct BufferInner<M> {
    records: Mutex<HashMap<ThreadId, BufferRecord<M>>>,
    settled_tx: mpsc::UnboundedSender<ThreadId>,
    debounce: Duration,
}

impl<M> BufferInner<M> {
    fn lock_records(&self) -> MutexGuard<'_, HashMap<ThreadId, BufferRecord<M>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer body: runs after `debounce` of quiet. A stale epoch means
    /// another enqueue superseded this timer between wake-up and lock.
    fn fire(&self, thread: &ThreadId, epoch: u64) {
        let mut records = self.lock_records();
        let Some(record) = records.get_mut(thread) else {
            return;
        };
        if record.epoch != epoch {
            return;
        }
        record.timer = None;
        if record.queue.is_empty() {
            // Fully drained while the timer was pending; nothing settled.
            records.remove(thread);
            return;
        }
        tracing::debug!(thread = %thread, pending = record.queue.len(), "input settled");
        let _ = self.settled_tx.send(thread.clone());
    }
}

/// Per-thread inbound accumulation with a debounce window.
///
/// Cheap to clone; all clones share the same records. Enqueue schedules its
/// timer on the ambient tokio runtime, so the buffer must be used from
/// within one.
pub struct MessageBuffer<M> {
    inner: Arc<BufferInner<M>>,
}

impl<M> Clone for MessageBuffer<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Send + 'static> MessageBuffer<M> {
    /// Create a buffer and the receiver on which "input settled" thread ids
    /// are delivered once the debounce window elapses without a new enqueue.
    #[must_use]
    pub fn new(debounce: Duration) -> (Self, mpsc::UnboundedReceiver<ThreadId>) {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let buffer = Self {
            inner: Arc::new(BufferInner {
                records: Mutex::new(HashMap::new()),
                settled_tx,
                debounce,
            }),
        };
        (buffer, settled_rx)
    }

    /// Append messages in order and reset the thread's debounce timer.
    ///
    /// An empty batch is a complete no-op: no record is created and a
    /// pending timer is left untouched. A `debounce` of zero fires on the
    /// next scheduling opportunity with no added delay.
    pub fn enqueue(&self, thread: &ThreadId, messages: impl IntoIterator<Item = M>) {
        let mut messages = messages.into_iter().peekable();
        if messages.peek().is_none() {
            return;
        }

        let mut records = self.inner.lock_records();
        let record = records.entry(thread.clone()).or_default();
        let before = record.queue.len();
        record.queue.extend(messages);
        record.epoch += 1;
        if let Some(stale) = record.timer.take() {
            stale.abort();
        }

        let inner = Arc::clone(&self.inner);
        let timer_thread = thread.clone();
        let epoch = record.epoch;
        // Anchor the deadline at enqueue time, not at the timer task's first
        // poll, so the window is exactly `debounce` after the last arrival.
        let deadline = tokio::time::Instant::now() + self.inner.debounce;
        record.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.fire(&timer_thread, epoch);
        }));

        tracing::trace!(
            thread = %thread,
            appended = record.queue.len() - before,
            queued = record.queue.len(),
            "messages enqueued"
        );
    }

    /// Remove and return up to `max` messages from the front, in arrival
    /// order. Does not touch the debounce timer.
    pub fn drain_all(&self, thread: &ThreadId, max: usize) -> Vec<M> {
        let mut records = self.inner.lock_records();
        let Some(record) = records.get_mut(thread) else {
            return Vec::new();
        };
        let take = max.min(record.queue.len());
        let drained: Vec<M> = record.queue.drain(..take).collect();
        if record.queue.is_empty() && record.timer.is_none() {
            records.remove(thread);
        }
        drained
    }

    /// Remove and return everything still queued, in arrival order.
    pub fn drain_remaining(&self, thread: &ThreadId) -> Vec<M> {
        self.drain_all(thread, usize::MAX)
    }

    /// Current queue length for `thread`; zero when nothing is buffered.
    #[must_use]
    pub fn len(&self, thread: &ThreadId) -> usize {
        self.inner
            .lock_records()
            .get(thread)
            .map_or(0, |record| record.queue.len())
    }

    #[must_use]
    pub fn is_empty(&self, thread: &ThreadId) -> bool {
        self.len(thread) == 0
    }

    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        self.inner.lock_records().len()
    }
}
