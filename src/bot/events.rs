use serenity::{
    async_trait,
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{output::SessionNotifier, registry::SessionRegistry, track::Track},
    error::PlayerError,
    ui::embeds,
};

/// Reports playback progress in the channel each track was requested from.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SessionNotifier for ChannelAnnouncer {
    async fn now_playing(&self, track: &Track) {
        let message = CreateMessage::new().embed(embeds::now_playing(track));
        if let Err(e) = track.channel.send_message(&self.http, message).await {
            warn!("❌ Could not announce {} in {}: {:?}", track.title, track.channel, e);
        }
    }

    async fn playback_failed(&self, track: &Track, error: &PlayerError) {
        let text = format!(
            "<@{}> An error occurred while processing `{} - {}`: {}",
            track.requester,
            track.artist_names(),
            track.title,
            error
        );
        if let Err(e) = track.channel.say(&self.http, text).await {
            warn!("❌ Could not report failure in {}: {:?}", track.channel, e);
        }
    }
}

/// Closes the guild's session when the bot was disconnected from voice by
/// someone else.
pub async fn handle_bot_voice_update(
    registry: &SessionRegistry,
    guild: GuildId,
    old_channel: Option<ChannelId>,
    new_channel: Option<ChannelId>,
) {
    if old_channel.is_none() || new_channel.is_some() {
        return;
    }

    let Some(session) = registry.get(guild) else {
        return;
    };

    info!("🔌 Bot was disconnected from voice in guild {}", guild);
    match session.leave().await {
        Ok(()) | Err(PlayerError::NotConnected) => {}
        Err(e) => warn!("❌ Cleaning up guild {} failed: {}", guild, e),
    }
    registry.remove(guild, &session);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{fakes::*, JoinIntent, Phase};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(FakeConnector::default()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeNotifier::default()),
        )
    }

    #[tokio::test]
    async fn test_external_disconnect_closes_session() {
        let registry = registry();
        let guild = GuildId::new(1);
        let session = registry.get_or_create(guild);
        session.join(ChannelId::new(10), JoinIntent::Stay).await.unwrap();

        handle_bot_voice_update(&registry, guild, Some(ChannelId::new(10)), None).await;

        assert!(registry.get(guild).is_none());
        assert_eq!(session.phase().await, Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_channel_change_keeps_session() {
        let registry = registry();
        let guild = GuildId::new(1);
        let session = registry.get_or_create(guild);
        session.join(ChannelId::new(10), JoinIntent::Stay).await.unwrap();

        handle_bot_voice_update(&registry, guild, Some(ChannelId::new(10)), Some(ChannelId::new(11))).await;
        handle_bot_voice_update(&registry, guild, None, Some(ChannelId::new(10))).await;

        assert!(registry.get(guild).is_some());
        assert_eq!(session.phase().await, Phase::Idle);
    }
}
