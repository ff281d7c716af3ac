use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// An inbound event delivered to a thread: a user message, a tool result, or
/// a webhook callback.
///
/// The coordinator treats this as an opaque payload; nothing below the
/// ingestion layer reads these fields. `metadata` carries source-specific
/// extras (reply targets, webhook headers) without widening the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Source-assigned identifier, unique within the source.
    pub id: String,
    /// Where the event came from (e.g. "discord", "webhook", "tool").
    pub source: String,
    /// Who produced it, in source-local terms.
    pub sender: String,
    /// Plain-text body.
    pub text: String,
    /// Source-specific extras; absent for most messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// When the ingestion layer accepted the event.
    pub received_at: SystemTime,
}

impl InboundMessage {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            sender: sender.into(),
            text: text.into(),
            metadata: None,
            received_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
