//! Coordinator configuration.

use std::time::Duration;

use serde::Deserialize;

/// What `join` does when the target thread has no holder.
///
/// Only `join` while locked is exercised by the platform today; the unlocked
/// case is a policy choice, so it is configurable rather than hard-coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinUnlockedBehavior {
    /// Nothing is in flight, so there is nothing to wait for: the join's
    /// processed signal resolves immediately.
    #[default]
    ResolveImmediately,
    /// Treat the join as early: the processed signal fires when the *next*
    /// occupancy on the thread releases.
    WaitForNextRelease,
}

/// Tunables for a [`TurnCoordinator`](crate::TurnCoordinator).
///
/// Deserializes from the platform config file; every field has a default so
/// the whole table can be omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Quiet window after the last enqueue before a thread's input counts as
    /// settled. Zero means "next scheduling opportunity".
    pub debounce_ms: u64,
    pub join_unlocked: JoinUnlockedBehavior,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            join_unlocked: JoinUnlockedBehavior::default(),
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config: CoordinatorConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.join_unlocked, JoinUnlockedBehavior::ResolveImmediately);
    }

    #[test]
    fn join_unlocked_uses_snake_case_names() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "debounce_ms": 0, "join_unlocked": "wait_for_next_release" }"#)
                .expect("deserialize");
        assert_eq!(config.debounce(), Duration::ZERO);
        assert_eq!(config.join_unlocked, JoinUnlockedBehavior::WaitForNextRelease);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<CoordinatorConfig>(r#"{ "debounce": 10 }"#);
        assert!(result.is_err());
    }
}
