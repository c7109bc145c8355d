//! Shared message types used by the channel adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Platform message ID.
    pub id: String,
    /// Chat/channel the message was posted in.
    pub chat_id: String,
    /// Author's platform user ID.
    pub author_id: String,
    /// Text content.
    pub content: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

/// Result of delivering an outbound message.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Platform message ID of the delivered message.
    pub message_id: String,
    /// Chat/channel it was delivered to.
    pub chat_id: String,
    /// Delivery time.
    pub timestamp: DateTime<Utc>,
}
