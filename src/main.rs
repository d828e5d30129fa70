use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod catalog;
mod config;
mod error;
mod ui;

use crate::audio::{registry::SessionRegistry, voice::SongbirdConnector};
use crate::bot::{events::ChannelAnnouncer, MusicBot, ShardManagerContainer};
use crate::catalog::{CatalogClient, HttpTransport};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ncm_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting ncm-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let transport = HttpTransport::new(&config)?;
    let http_client = transport.http_client();
    let catalog = Arc::new(CatalogClient::new(
        Arc::new(transport),
        config.download_dir.clone(),
        config.bitrate,
        config.download,
    ));

    let songbird = Songbird::serenity();
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(SongbirdConnector::new(songbird.clone(), http_client)),
        catalog.clone(),
        Arc::new(ChannelAnnouncer::new(Arc::new(Http::new(&config.token)))),
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = MusicBot::new(config.clone(), catalog, registry.clone());
    let mut client = Client::builder(&config.token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    {
        let mut data = client.data.write().await;
        data.insert::<ShardManagerContainer>(client.shard_manager.clone());
    }

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        registry.shutdown_all().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
