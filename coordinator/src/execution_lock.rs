//! Per-thread single-flight execution lock with joinable waiters.
//!
//! Grants at most one active holder per [`ThreadId`]. Contending acquires
//! queue FIFO and suspend on a oneshot channel until promoted; interested
//! parties can instead *join* the current occupancy, which never contends for
//! the lock and only observes the moment the holder releases. Waiters and
//! joiners are deliberately disjoint: a waiter wants to become the next
//! holder, a joiner only wants to know when the current one finishes.
//!
//! All shared state lives behind a plain `std::sync::Mutex` that is never
//! held across an await point; suspension happens exclusively on the oneshot
//! channels handed out while the mutex is unlocked.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU64;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;

use parley_types::{ResourceTag, ThreadId};

use crate::config::JoinUnlockedBehavior;

/// Release was called with a token that does not match the current holder.
///
/// Always a caller bug (double release or a stale token kept past promotion).
/// Surfaced synchronously and never retried internally: silently accepting a
/// mismatched release would corrupt the single-holder invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockMisuseError {
    #[error("thread {thread} is not locked")]
    NotLocked { thread: ThreadId },
    #[error("token {presented} is stale for thread {thread}; current holder is {current}")]
    StaleToken {
        thread: ThreadId,
        presented: u64,
        current: u64,
    },
}

/// Exclusive execution rights for one thread.
///
/// Minted by [`ExecutionLock::acquire`] / [`ExecutionLock::try_acquire`] and
/// spent by [`ExecutionLock::release`], which validates it against the
/// current holder so double or stale releases surface as
/// [`LockMisuseError`]. Dropping a token without releasing leaves the thread
/// locked permanently; guaranteeing release on every exit path is the
/// turn-execution layer's contract.
#[derive(Debug)]
pub struct LockToken {
    thread: ThreadId,
    tag: ResourceTag,
    serial: NonZeroU64,
}

impl LockToken {
    #[must_use]
    pub fn thread(&self) -> &ThreadId {
        &self.thread
    }

    #[must_use]
    pub fn tag(&self) -> &ResourceTag {
        &self.tag
    }
}

/// Handle returned by [`ExecutionLock::join`].
#[derive(Debug)]
pub struct Joined {
    processed: ProcessedSignal,
}

#[derive(Debug)]
enum ProcessedSignal {
    /// The thread was unlocked at join time; nothing to wait for.
    Ready,
    /// Fires when the occupancy joined against releases.
    Pending(oneshot::Receiver<()>),
}

impl Joined {
    fn ready() -> Self {
        Self {
            processed: ProcessedSignal::Ready,
        }
    }

    fn pending(rx: oneshot::Receiver<()>) -> Self {
        Self {
            processed: ProcessedSignal::Pending(rx),
        }
    }

    /// Resolves when the occupancy this join observed has released.
    ///
    /// A dropped sender (the lock itself going away) counts as processed;
    /// there is no occupancy left to wait for.
    pub async fn processed(self) {
        match self.processed {
            ProcessedSignal::Ready => {}
            ProcessedSignal::Pending(rx) => {
                let _ = rx.await;
            }
        }
    }
}

struct PendingAcquire {
    tag: ResourceTag,
    grant: oneshot::Sender<LockToken>,
}

#[derive(Default)]
struct LockRecord {
    /// Serial of the current holder's token, set only while locked.
    holder: Option<NonZeroU64>,
    /// Pending acquires, promoted strictly FIFO.
    waiters: VecDeque<PendingAcquire>,
    /// Completion signals attached to the current occupancy.
    joiners: Vec<oneshot::Sender<()>>,
}

impl LockRecord {
    fn is_idle(&self) -> bool {
        self.holder.is_none() && self.waiters.is_empty() && self.joiners.is_empty()
    }
}

struct LockState {
    records: HashMap<ThreadId, LockRecord>,
    next_serial: NonZeroU64,
}

impl LockState {
    fn mint_serial(&mut self) -> NonZeroU64 {
        let serial = self.next_serial;
        self.next_serial = serial.saturating_add(1);
        serial
    }
}

/// Serializes turn execution per thread. See the module docs.
pub struct ExecutionLock {
    state: Mutex<LockState>,
    join_unlocked: JoinUnlockedBehavior,
}

impl Default for ExecutionLock {
    fn default() -> Self {
        Self::new(JoinUnlockedBehavior::default())
    }
}

impl ExecutionLock {
    #[must_use]
    pub fn new(join_unlocked: JoinUnlockedBehavior) -> Self {
        Self {
            state: Mutex::new(LockState {
                records: HashMap::new(),
                next_serial: NonZeroU64::MIN,
            }),
            join_unlocked,
        }
    }

    /// Acquire exclusive execution rights for `thread`.
    ///
    /// Grants immediately when the thread is unlocked; otherwise queues FIFO
    /// behind earlier acquires and suspends until promoted by a release.
    pub async fn acquire(&self, thread: ThreadId, tag: ResourceTag) -> LockToken {
        let rx = {
            let mut state = self.lock_state();
            let serial = state.mint_serial();
            let record = state.records.entry(thread.clone()).or_default();
            if record.holder.is_none() {
                record.holder = Some(serial);
                tracing::debug!(thread = %thread, tag = %tag, "lock acquired");
                return LockToken {
                    thread,
                    tag,
                    serial,
                };
            }
            let (tx, rx) = oneshot::channel();
            record.waiters.push_back(PendingAcquire { tag, grant: tx });
            tracing::debug!(
                thread = %thread,
                queue_depth = record.waiters.len(),
                "lock contended, waiting for promotion"
            );
            rx
        };

        match rx.await {
            Ok(token) => token,
            // The grant sender lives inside `self.state` and is only removed
            // by promotion, which always sends first. Unreachable while the
            // lock itself is alive, and it is borrowed for this await.
            Err(_) => unreachable!("execution lock dropped while a waiter was queued"),
        }
    }

    /// Non-suspending acquire: grants only when the thread is unlocked.
    ///
    /// Inbound-event handlers use this to decide between starting a turn and
    /// joining the one already in flight.
    pub fn try_acquire(&self, thread: ThreadId, tag: ResourceTag) -> Option<LockToken> {
        let mut state = self.lock_state();
        let serial = state.mint_serial();
        let record = state.records.entry(thread.clone()).or_default();
        if record.holder.is_some() {
            return None;
        }
        record.holder = Some(serial);
        tracing::debug!(thread = %thread, tag = %tag, "lock acquired");
        Some(LockToken {
            thread,
            tag,
            serial,
        })
    }

    /// End the occupancy `token` was granted for.
    ///
    /// Fires every joiner attached to the occupancy exactly once, then
    /// promotes the head waiter (skipping acquires whose futures were
    /// dropped) or unlocks the thread and reclaims its record.
    pub fn release(&self, token: &LockToken) -> Result<(), LockMisuseError> {
        let thread = &token.thread;
        let serial = token.serial;
        let mut state = self.lock_state();
        let LockState {
            records,
            next_serial,
        } = &mut *state;

        let Some(record) = records.get_mut(thread) else {
            tracing::warn!(thread = %thread, "release of a thread that is not locked");
            return Err(LockMisuseError::NotLocked {
                thread: thread.clone(),
            });
        };
        match record.holder {
            None => {
                tracing::warn!(thread = %thread, "release of a thread that is not locked");
                return Err(LockMisuseError::NotLocked {
                    thread: thread.clone(),
                });
            }
            Some(current) if current != serial => {
                tracing::warn!(
                    thread = %thread,
                    presented = serial.get(),
                    current = current.get(),
                    "release with a stale token"
                );
                return Err(LockMisuseError::StaleToken {
                    thread: thread.clone(),
                    presented: serial.get(),
                    current: current.get(),
                });
            }
            Some(_) => {}
        }

        let joiners = record.joiners.drain(..);
        let notified = joiners.len();
        for joiner in joiners {
            let _ = joiner.send(());
        }

        record.holder = None;
        while let Some(pending) = record.waiters.pop_front() {
            let serial = *next_serial;
            *next_serial = serial.saturating_add(1);
            let granted = pending.grant.send(LockToken {
                thread: thread.clone(),
                tag: pending.tag,
                serial,
            });
            if granted.is_ok() {
                record.holder = Some(serial);
                break;
            }
            // The acquire future was dropped before promotion; fall through
            // to the next waiter so the queue cannot wedge.
            tracing::trace!(thread = %thread, "skipping abandoned waiter");
        }

        tracing::debug!(
            thread = %thread,
            joiners_notified = notified,
            promoted = record.holder.is_some(),
            "lock released"
        );

        if record.is_idle() {
            records.remove(thread);
        }
        Ok(())
    }

    /// Observe the completion of the occupancy currently holding `thread`.
    ///
    /// Never contends for the lock and never mutates holder state. When the
    /// thread is unlocked the configured [`JoinUnlockedBehavior`] decides
    /// between resolving immediately (default) and waiting for the release
    /// of the next occupancy.
    pub fn join(&self, thread: &ThreadId) -> Joined {
        let mut state = self.lock_state();
        if let Some(record) = state.records.get_mut(thread) {
            if record.holder.is_some() {
                let (tx, rx) = oneshot::channel();
                record.joiners.push(tx);
                tracing::debug!(thread = %thread, "joined in-flight occupancy");
                return Joined::pending(rx);
            }
        }
        match self.join_unlocked {
            JoinUnlockedBehavior::ResolveImmediately => {
                tracing::debug!(thread = %thread, "join on unlocked thread, resolved immediately");
                Joined::ready()
            }
            JoinUnlockedBehavior::WaitForNextRelease => {
                let record = state.records.entry(thread.clone()).or_default();
                let (tx, rx) = oneshot::channel();
                record.joiners.push(tx);
                tracing::debug!(thread = %thread, "join on unlocked thread, waiting for next release");
                Joined::pending(rx)
            }
        }
    }

    /// Whether `thread` currently has a holder.
    #[must_use]
    pub fn is_locked(&self, thread: &ThreadId) -> bool {
        self.lock_state()
            .records
            .get(thread)
            .is_some_and(|record| record.holder.is_some())
    }

    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        self.lock_state().records.len()
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self, thread: &ThreadId) -> usize {
        self.lock_state()
            .records
            .get(thread)
            .map_or(0, |record| record.waiters.len())
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        // State mutation never panics while holding the guard, so a poisoned
        // mutex still contains a coherent map.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
