//! # Bot Module
//!
//! Discord side of the bot: prefix commands, the selection prompt and the
//! gateway event handlers.
//!
//! ## Architecture
//!
//! [`MusicBot`] implements serenity's [`EventHandler`]. Incoming messages
//! that start with the configured prefix are resolved against the static
//! command table in [`commands`] and run by [`handlers::run`]. Playback is
//! delegated to the per-guild sessions of the
//! [`SessionRegistry`](crate::audio::registry::SessionRegistry).
//!
//! - [`commands`]: command table, aliases and runtime group toggles
//! - [`handlers`]: one handler per command
//! - [`search`]: numbered selection prompt
//! - [`events`]: now-playing announcements and voice state cleanup

use serenity::{
    all::{ActivityData, Context, EventHandler, Message, Ready, ShardManager, UserId, VoiceState},
    async_trait,
    prelude::TypeMapKey,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod search;

use crate::{
    audio::registry::SessionRegistry, bot::commands::GroupToggles, catalog::CatalogClient, config::Config,
    error::CommandError,
};

/// Makes the shard manager reachable from command handlers (`logout`).
pub struct ShardManagerContainer;

impl TypeMapKey for ShardManagerContainer {
    type Value = Arc<ShardManager>;
}

/// Gateway event handler shared by every shard.
pub struct MusicBot {
    pub config: Arc<Config>,
    pub catalog: Arc<CatalogClient>,
    pub registry: Arc<SessionRegistry>,
    /// Command groups enabled through `load` / `unload`.
    pub groups: GroupToggles,
    /// Configured owner, or the application owner once `ready` fired.
    owner: OnceLock<UserId>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, catalog: Arc<CatalogClient>, registry: Arc<SessionRegistry>) -> Self {
        let owner = OnceLock::new();
        if let Some(id) = config.owner_id {
            let _ = owner.set(UserId::new(id));
        }

        Self {
            config,
            catalog,
            registry,
            groups: GroupToggles::default(),
            owner,
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner.get() == Some(&user)
    }

    async fn resolve_owner(&self, ctx: &Context) {
        if self.owner.get().is_some() {
            return;
        }

        match ctx.http.get_current_application_info().await {
            Ok(info) => match info.owner {
                Some(owner) => {
                    info!("👑 Bot owner is {} ({})", owner.name, owner.id);
                    let _ = self.owner.set(owner.id);
                }
                None => warn!("⚠️ Application has no owner; owner commands are disabled"),
            },
            Err(e) => warn!("⚠️ Could not fetch application info: {:?}", e),
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening("Music")));
        self.resolve_owner(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some((name, args)) = commands::parse_invocation(&msg.content, &self.config.prefix) else {
            return;
        };
        let Some(spec) = commands::find(name) else {
            debug!("Unknown command `{}` from {}", name, msg.author.name);
            return;
        };
        if !self.groups.is_enabled(spec.group) {
            debug!("Ignoring `{}`, group {} is unloaded", spec.name, spec.group.name());
            return;
        }

        if let Err(e) = handlers::run(&ctx, &msg, self, spec, args).await {
            let text = match e.downcast_ref::<CommandError>() {
                Some(CommandError::SelectionTimeout) => e.to_string(),
                _ => {
                    error!("❌ Command {} failed: {:?}", spec.name, e);
                    format!("An error occurred: {e}")
                }
            };

            if let Err(why) = msg.channel_id.say(&ctx.http, text).await {
                error!("❌ Could not report error in {}: {:?}", msg.channel_id, why);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        let Some(guild) = new.guild_id else {
            return;
        };

        let old_channel = old.and_then(|state| state.channel_id);
        events::handle_bot_voice_update(&self.registry, guild, old_channel, new.channel_id).await;
    }
}
