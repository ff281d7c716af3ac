//! Thread turn coordination for Parley agents.
//!
//! Inbound events (user messages, tool results, webhook callbacks) arrive per
//! conversation thread from multiple sources concurrently, but each thread's
//! agent must execute turns one at a time over a coherent, ordered batch of
//! new input. This crate decides *when* a new turn may start and *what* input
//! it consumes, through two cooperating primitives:
//!
//! - [`ExecutionLock`]: at most one holder per thread, FIFO waiters, and
//!   joiners that observe the in-flight turn's completion without contending
//!   for the lock.
//! - [`MessageBuffer`]: per-thread FIFO accumulation with a debounce window,
//!   so bursts coalesce into a single turn's input.
//!
//! [`TurnCoordinator`] wires the pair together behind the interface the
//! turn-execution layer consumes. Everything is process-local and in-memory;
//! persistence, turn logic, and transports live elsewhere.

mod config;
mod execution_lock;
mod message_buffer;
mod turn;

pub use config::{CoordinatorConfig, JoinUnlockedBehavior};
pub use execution_lock::{ExecutionLock, Joined, LockMisuseError, LockToken};
pub use message_buffer::MessageBuffer;
pub use turn::TurnCoordinator;
