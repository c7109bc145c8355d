//! Lambot CLI - Discord bridge to a Transmission daemon.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lambot_channels::{Channel, DiscordChannel, Dispatcher};
use lambot_core::{BotToken, Config};
use lambot_transmission::Session;

#[derive(Parser)]
#[command(name = "lambot")]
#[command(about = "Lambot - Discord bridge to a Transmission daemon")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (default: search /etc/lambot, ~/.config/lambot, .)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and Transmission, then wait for shutdown
    Run,

    /// Check Discord and Transmission connectivity and exit
    Probe,

    /// Run a single bot command against a channel
    Exec {
        /// Target Discord channel ID
        #[arg(long)]
        channel: String,

        /// Command text, e.g. "?torrents get"
        command: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Probe => probe(&config).await,
        Commands::Exec { channel, command } => exec(&config, &channel, &command).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(p) => Config::load(p)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn bot_token(config: &Config) -> anyhow::Result<BotToken> {
    let token = config
        .discord
        .token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("discord token missing from config"))?;
    Ok(BotToken::new(token))
}

async fn connect_transmission(config: &Config) -> anyhow::Result<Session> {
    tracing::info!("Connecting to Transmission...");
    let t = &config.transmission;
    let session = Session::connect(&t.url(), &t.username, &t.password).await?;
    tracing::info!(url = session.url(), "Transmission session established");
    Ok(session)
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let _session = connect_transmission(config).await?;

    let discord = DiscordChannel::new(bot_token(config)?);
    discord.start().await?;

    tracing::info!("Bot is now running. Press CTRL-C to exit.");
    shutdown_signal().await?;

    discord.stop().await?;
    tracing::info!("Bot stopped");
    Ok(())
}

async fn probe(config: &Config) -> anyhow::Result<()> {
    let discord = DiscordChannel::new(bot_token(config)?);
    let status = discord.probe().await?;
    if status.connected {
        tracing::info!(
            account = status.display_name.as_deref().unwrap_or("?"),
            "Discord: ok"
        );
    } else {
        tracing::error!(
            error = status.error.as_deref().unwrap_or("unknown"),
            "Discord: unreachable"
        );
    }

    match connect_transmission(config).await {
        Ok(_) => tracing::info!("Transmission: ok"),
        Err(e) => tracing::error!(error = %e, "Transmission: unreachable"),
    }

    Ok(())
}

async fn exec(config: &Config, channel_id: &str, command: &str) -> anyhow::Result<()> {
    let session = Arc::new(connect_transmission(config).await?);

    let discord = Arc::new(DiscordChannel::new(bot_token(config)?));
    discord.start().await?;

    let mut dispatcher = Dispatcher::new(
        session,
        Arc::clone(&discord) as Arc<dyn lambot_channels::ChannelOutbound>,
    );
    if let Some(bot_id) = discord.bot_id().await {
        dispatcher = dispatcher.with_self_id(bot_id);
    }

    dispatcher.on_command(channel_id, command).await?;
    discord.stop().await?;
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
