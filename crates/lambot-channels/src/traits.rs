//! Channel traits.

use async_trait::async_trait;
use thiserror::Error;

use lambot_core::types::DeliveryResult;

/// Channel errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel not connected.
    #[error("Channel not connected")]
    NotConnected,

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Message delivery failed.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Channel health probe result.
#[derive(Debug, Clone)]
pub struct ChannelProbe {
    /// Whether channel is connected.
    pub connected: bool,
    /// Account/bot identifier.
    pub account_id: Option<String>,
    /// Account display name.
    pub display_name: Option<String>,
    /// Error message if not connected.
    pub error: Option<String>,
}

/// Context for outbound messages.
#[derive(Debug, Clone)]
pub struct OutboundContext {
    /// Target chat/channel ID.
    pub chat_id: String,
    /// Reply to message ID.
    pub reply_to: Option<String>,
}

/// Core channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel identifier (e.g., "discord").
    fn id(&self) -> &str;

    /// Human-readable label.
    fn label(&self) -> &str;

    /// Connect and verify credentials.
    async fn start(&self) -> Result<(), ChannelError>;

    /// Disconnect.
    async fn stop(&self) -> Result<(), ChannelError>;

    /// Check if channel is ready.
    async fn probe(&self) -> Result<ChannelProbe, ChannelError>;
}

/// Outbound message delivery trait.
#[async_trait]
pub trait ChannelOutbound: Channel {
    /// Send a text message.
    async fn send_text(
        &self,
        ctx: OutboundContext,
        text: &str,
    ) -> Result<DeliveryResult, ChannelError>;

    /// Maximum text message length.
    fn text_chunk_limit(&self) -> usize;
}
