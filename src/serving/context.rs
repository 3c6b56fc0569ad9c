//! Per-request context passed explicitly into serving operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent what, where and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Namespace (topic) the message belongs to
    pub namespace: String,
    /// Sender's display name
    pub author: String,
    /// Transport message ID
    pub message_id: i64,
    /// Raw message text
    pub message_text: String,
    /// When the message was received
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Context for a message received now
    pub fn new(
        namespace: impl Into<String>,
        author: impl Into<String>,
        message_id: i64,
        message_text: impl Into<String>,
    ) -> Self {
        RequestContext {
            namespace: namespace.into(),
            author: author.into(),
            message_id,
            message_text: message_text.into(),
            received_at: Utc::now(),
        }
    }

    /// Override the receive time
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }
}
