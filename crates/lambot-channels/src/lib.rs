//! # Lambot Channels
//!
//! Chat channel adapters and command dispatch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

/// Discord channel adapter.
pub mod discord;
/// Command dispatch.
pub mod dispatcher;

pub use dispatcher::{Dispatcher, TorrentSource};
pub use discord::DiscordChannel;
pub use traits::{
    Channel, ChannelError, ChannelOutbound, ChannelProbe, OutboundContext,
};
