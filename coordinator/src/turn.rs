//! The coordinator facade consumed by the turn-execution layer.

use tokio::sync::mpsc;

use parley_types::{ResourceTag, ThreadId};

use crate::config::CoordinatorConfig;
use crate::execution_lock::{ExecutionLock, Joined, LockMisuseError, LockToken};
use crate::message_buffer::MessageBuffer;

/// Pairs the per-thread execution lock with the per-thread message buffer.
///
/// The intended flow for an inbound event: [`enqueue`](Self::enqueue) the
/// event, then [`try_acquire`](Self::try_acquire). On a grant, drain the
/// buffer and run a turn, releasing on every exit path. On `None`, a turn is
/// already in flight — [`join`](Self::join) it instead of starting a second
/// one, and decide after its release whether the messages that arrived
/// meanwhile warrant a follow-up turn.
///
/// Exactly one coordinator must exist for a given set of threads in a
/// process; records are process-local with no cross-instance sync.
pub struct TurnCoordinator<M> {
    lock: ExecutionLock,
    buffer: MessageBuffer<M>,
}

impl<M: Send + 'static> TurnCoordinator<M> {
    /// Build a coordinator and the receiver of "input settled" notifications
    /// fired by the buffer's debounce timers.
    #[must_use]
    pub fn new(config: &CoordinatorConfig) -> (Self, mpsc::UnboundedReceiver<ThreadId>) {
        let (buffer, settled_rx) = MessageBuffer::new(config.debounce());
        let coordinator = Self {
            lock: ExecutionLock::new(config.join_unlocked),
            buffer,
        };
        (coordinator, settled_rx)
    }

    /// Acquire the thread's turn lock, suspending while another turn runs.
    pub async fn acquire(&self, thread: ThreadId, tag: ResourceTag) -> LockToken {
        self.lock.acquire(thread, tag).await
    }

    /// Acquire only if no turn is in flight for the thread.
    pub fn try_acquire(&self, thread: ThreadId, tag: ResourceTag) -> Option<LockToken> {
        self.lock.try_acquire(thread, tag)
    }

    /// End the turn `token` was granted for, waking joiners and the next
    /// queued acquire.
    pub fn release(&self, token: &LockToken) -> Result<(), LockMisuseError> {
        self.lock.release(token)
    }

    /// Ride the in-flight turn instead of starting one.
    ///
    /// `messages` is a convenience pass-through to the buffer (empty batches
    /// are a no-op there); the join itself never mutates lock state.
    pub fn join(&self, thread: &ThreadId, messages: impl IntoIterator<Item = M>) -> Joined {
        self.buffer.enqueue(thread, messages);
        self.lock.join(thread)
    }

    /// Append messages for the thread and reset its debounce timer.
    pub fn enqueue(&self, thread: &ThreadId, messages: impl IntoIterator<Item = M>) {
        self.buffer.enqueue(thread, messages);
    }

    /// FIFO-drain up to `max` buffered messages.
    pub fn drain_all(&self, thread: &ThreadId, max: usize) -> Vec<M> {
        self.buffer.drain_all(thread, max)
    }

    /// FIFO-drain everything still buffered.
    pub fn drain_remaining(&self, thread: &ThreadId) -> Vec<M> {
        self.buffer.drain_remaining(thread)
    }

    /// Buffered message count for the thread.
    #[must_use]
    pub fn size(&self, thread: &ThreadId) -> usize {
        self.buffer.len(thread)
    }

    /// Whether a turn is currently in flight for the thread.
    #[must_use]
    pub fn is_locked(&self, thread: &ThreadId) -> bool {
        self.lock.is_locked(thread)
    }

    /// Direct access to the underlying buffer, for callers that hold one
    /// half of the pair (e.g. the ingestion layer).
    #[must_use]
    pub fn buffer(&self) -> &MessageBuffer<M> {
        &self.buffer
    }
}
