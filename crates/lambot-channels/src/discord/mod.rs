//! Discord channel adapter using the Bot REST API.
//!
//! Outbound only: inbound gateway events are normalized through
//! [`DiscordChannel::normalize`], but the websocket event loop itself lives
//! outside this crate.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use lambot_core::secrets::BotToken;
use lambot_core::types::{DeliveryResult, Message};

use crate::traits::{Channel, ChannelError, ChannelOutbound, ChannelProbe, OutboundContext};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord channel adapter.
pub struct DiscordChannel {
    client: Client,
    token: BotToken,
    base_url: String,
    state: Arc<RwLock<DiscordState>>,
}

#[derive(Debug, Default)]
struct DiscordState {
    bot_id: Option<String>,
    username: Option<String>,
    connected: bool,
}

impl DiscordChannel {
    /// Create a new Discord channel.
    #[must_use]
    pub fn new(token: BotToken) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE)
    }

    /// Create with a custom API base URL.
    #[must_use]
    pub fn with_base_url(token: BotToken, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url: base_url.into(),
            state: Arc::new(RwLock::new(DiscordState::default())),
        }
    }

    /// The bot's own user ID, once connected.
    pub async fn bot_id(&self) -> Option<String> {
        self.state.read().await.bot_id.clone()
    }

    /// Call a Discord API endpoint.
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, ChannelError> {
        let url = format!("{}{endpoint}", self.base_url);

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token.expose()))
            .header("Content-Type", "application/json");

        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            if status.as_u16() == 429 {
                return Err(ChannelError::RateLimited);
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(ChannelError::AuthFailed(status.to_string()));
            }
            let text = response.text().await.unwrap_or_default();
            return Err(ChannelError::Network(format!("{status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))
    }

    /// Normalize a gateway MESSAGE_CREATE event to the common format.
    ///
    /// # Errors
    ///
    /// `Config` when the event carries no message data or author.
    pub fn normalize(&self, raw: DiscordGatewayEvent) -> Result<Message, ChannelError> {
        let msg = raw
            .d
            .ok_or_else(|| ChannelError::Config("No message data in event".to_string()))?;

        let author = msg
            .author
            .ok_or_else(|| ChannelError::Config("No author in message".to_string()))?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&msg.timestamp)
            .map_or_else(|_| chrono::Utc::now(), |dt| dt.with_timezone(&chrono::Utc));

        Ok(Message {
            id: msg.id,
            chat_id: msg.channel_id,
            author_id: author.id,
            content: msg.content.unwrap_or_default(),
            timestamp,
        })
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn id(&self) -> &'static str {
        "discord"
    }

    fn label(&self) -> &'static str {
        "Discord"
    }

    async fn start(&self) -> Result<(), ChannelError> {
        let me: DiscordUser = self
            .call(reqwest::Method::GET, "/users/@me", None::<&()>)
            .await?;

        let mut state = self.state.write().await;
        state.bot_id = Some(me.id.clone());
        state.username = Some(me.username.clone());
        state.connected = true;

        tracing::info!("Discord bot connected: {}", me.username);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        let mut state = self.state.write().await;
        state.connected = false;
        Ok(())
    }

    async fn probe(&self) -> Result<ChannelProbe, ChannelError> {
        match self
            .call::<DiscordUser>(reqwest::Method::GET, "/users/@me", None::<&()>)
            .await
        {
            Ok(me) => Ok(ChannelProbe {
                connected: true,
                account_id: Some(me.id),
                display_name: Some(me.username),
                error: None,
            }),
            Err(e) => Ok(ChannelProbe {
                connected: false,
                account_id: None,
                display_name: None,
                error: Some(e.to_string()),
            }),
        }
    }
}

#[async_trait]
impl ChannelOutbound for DiscordChannel {
    async fn send_text(
        &self,
        ctx: OutboundContext,
        text: &str,
    ) -> Result<DeliveryResult, ChannelError> {
        let endpoint = format!("/channels/{}/messages", ctx.chat_id);

        let params = CreateMessageParams {
            content: text.to_string(),
            message_reference: ctx.reply_to.map(|id| MessageReference {
                message_id: Some(id),
            }),
            allowed_mentions: AllowedMentions::default(),
        };

        let result: DiscordMessage = self
            .call(reqwest::Method::POST, &endpoint, Some(&params))
            .await?;

        Ok(DeliveryResult {
            message_id: result.id,
            chat_id: ctx.chat_id,
            timestamp: chrono::Utc::now(),
        })
    }

    fn text_chunk_limit(&self) -> usize {
        2000 // Discord message limit
    }
}

// Discord API types

/// Discord user object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    /// User's unique ID.
    pub id: String,
    /// User's username.
    pub username: String,
    /// Whether the user is a bot.
    #[serde(default)]
    pub bot: bool,
}

/// Discord message object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMessage {
    /// Message ID.
    pub id: String,
    /// Channel ID.
    pub channel_id: String,
    /// Message author.
    pub author: Option<DiscordUser>,
    /// Message content.
    pub content: Option<String>,
    /// Message timestamp (ISO 8601).
    pub timestamp: String,
}

/// Message reference for replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReference {
    /// Referenced message ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Create message parameters.
#[derive(Debug, Serialize)]
struct CreateMessageParams {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference>,
    allowed_mentions: AllowedMentions,
}

/// Allowed mentions configuration.
#[derive(Debug, Default, Serialize)]
struct AllowedMentions {
    parse: Vec<String>,
}

/// Gateway event wrapper (for inbound messages).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordGatewayEvent {
    /// Event type.
    pub t: Option<String>,
    /// Event data.
    pub d: Option<DiscordMessage>,
}
