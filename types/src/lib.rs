//! Core domain types for Parley.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the platform.

mod ids;
mod message;

pub use ids::{ResourceTag, ThreadId};
pub use message::InboundMessage;
