use std::fmt;
use std::sync::Arc;

/// Identifier for one conversation thread.
///
/// Opaque and comparable; every piece of coordinator state is partitioned by
/// this key, with no cross-thread interaction. Unrelated to OS or runtime
/// threads. Backed by `Arc<str>` so clones are cheap enough to use as map
/// keys and to carry inside tokens and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ThreadId(Arc<str>);

impl ThreadId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ThreadId> for String {
    fn from(value: ThreadId) -> Self {
        value.0.as_ref().to_owned()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label describing what an acquire request is executing on behalf of
/// (e.g. an ingestion source or turn kind).
///
/// Folded into the holder token at grant time; the coordinator never
/// interprets it beyond diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourceTag(Arc<str>);

impl ResourceTag {
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ResourceTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ResourceTag> for String {
    fn from(value: ResourceTag) -> Self {
        value.0.as_ref().to_owned()
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_round_trips_through_serde() {
        let id = ThreadId::new("discord:guild-1:channel-9");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"discord:guild-1:channel-9\"");
        let back: ThreadId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn thread_id_equality_is_by_value() {
        assert_eq!(ThreadId::new("t1"), ThreadId::from("t1".to_string()));
        assert_ne!(ThreadId::new("t1"), ThreadId::new("t2"));
    }

    #[test]
    fn resource_tag_displays_its_label() {
        assert_eq!(ResourceTag::new("webhook").to_string(), "webhook");
    }
}
