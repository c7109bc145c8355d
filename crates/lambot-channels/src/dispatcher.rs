//! Command dispatch.
//!
//! Maps inbound chat commands to Transmission RPC calls and formats the
//! results for display. An RPC failure degrades to an error reply on the
//! channel; it never takes the process down.

use async_trait::async_trait;
use std::sync::Arc;

use lambot_core::types::Message;
use lambot_transmission::{Session, Torrent, TransmissionError};

use crate::traits::{ChannelError, ChannelOutbound, OutboundContext};

/// Source of torrent listings. Implemented by the Transmission session;
/// the seam keeps the dispatcher testable without a daemon.
#[async_trait]
pub trait TorrentSource: Send + Sync {
    /// Fetch the current torrent listing.
    async fn torrents(&self) -> Result<Vec<Torrent>, TransmissionError>;
}

#[async_trait]
impl TorrentSource for Session {
    async fn torrents(&self) -> Result<Vec<Torrent>, TransmissionError> {
        self.get_torrents().await
    }
}

/// Maps chat commands to actions and sends the replies.
pub struct Dispatcher {
    torrents: Arc<dyn TorrentSource>,
    outbound: Arc<dyn ChannelOutbound>,
    self_id: Option<String>,
}

impl Dispatcher {
    /// Create a dispatcher over a torrent source and an outbound channel.
    pub fn new(torrents: Arc<dyn TorrentSource>, outbound: Arc<dyn ChannelOutbound>) -> Self {
        Self {
            torrents,
            outbound,
            self_id: None,
        }
    }

    /// Set the bot's own account ID so its messages are ignored.
    #[must_use]
    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }

    /// Handle a normalized inbound message.
    ///
    /// # Errors
    ///
    /// Returns error only when delivering the reply fails.
    pub async fn handle_message(&self, message: &Message) -> Result<(), ChannelError> {
        if self.self_id.as_deref() == Some(message.author_id.as_str()) {
            return Ok(());
        }
        self.on_command(&message.chat_id, &message.content).await
    }

    /// Handle a command posted in a channel.
    ///
    /// Unknown text is ignored; bots see all channel traffic.
    ///
    /// # Errors
    ///
    /// Returns error only when delivering the reply fails.
    pub async fn on_command(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let reply = match text.trim() {
            "?ping" => "Pong!".to_string(),
            "?pong" => "Ping!".to_string(),
            "?torrents get" => self.torrent_listing().await,
            _ => return Ok(()),
        };

        let ctx = OutboundContext {
            chat_id: chat_id.to_string(),
            reply_to: None,
        };
        self.outbound.send_text(ctx, &reply).await?;
        Ok(())
    }

    async fn torrent_listing(&self) -> String {
        match self.torrents.torrents().await {
            Ok(torrents) => format_torrents(&torrents),
            Err(e) => {
                tracing::warn!(error = %e, "torrent listing failed");
                "Could not reach the torrent daemon, try again later.".to_string()
            }
        }
    }
}

/// Format a torrent listing as a fixed-width code block.
#[must_use]
pub fn format_torrents(torrents: &[Torrent]) -> String {
    use std::fmt::Write as _;

    let mut out = String::from("```\n");
    for t in torrents {
        let _ = writeln!(
            out,
            "{:4}. [{}x{}] {{{}}} {}",
            t.id, t.rate_download, t.rate_upload, t.status, t.name
        );
    }
    out.push_str("```");
    out
}
