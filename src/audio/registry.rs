use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{
        output::{SessionNotifier, SourceResolver, VoiceConnector},
        session::VoiceSession,
    },
    error::PlayerError,
};

/// Owns the voice session of every guild the bot is active in.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<VoiceSession>>,
    connector: Arc<dyn VoiceConnector>,
    resolver: Arc<dyn SourceResolver>,
    notifier: Arc<dyn SessionNotifier>,
}

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        resolver: Arc<dyn SourceResolver>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            connector,
            resolver,
            notifier,
        }
    }

    /// The guild's session, created on first use. A closed session left
    /// behind by `leave` is replaced by a fresh one.
    pub fn get_or_create(&self, guild: GuildId) -> Arc<VoiceSession> {
        match self.sessions.entry(guild) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    entry.insert(self.create(guild));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(self.create(guild)).clone(),
        }
    }

    pub fn get(&self, guild: GuildId) -> Option<Arc<VoiceSession>> {
        self.sessions.get(&guild).map(|session| session.clone())
    }

    /// Forgets `session` if it is still the one registered for `guild`.
    pub fn remove(&self, guild: GuildId, session: &Arc<VoiceSession>) -> bool {
        self.sessions
            .remove_if(&guild, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// Disconnects the guild's session and forgets it.
    pub async fn leave(&self, guild: GuildId) -> Result<(), PlayerError> {
        let session = self.get(guild).ok_or(PlayerError::NotConnected)?;
        session.leave().await?;
        self.remove(guild, &session);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Leaves every session; used when the bot shuts down.
    pub async fn shutdown_all(&self) {
        info!("👋 Closing {} voice sessions", self.len());
        let sessions: Vec<(GuildId, Arc<VoiceSession>)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (guild, session) in sessions {
            match session.leave().await {
                Ok(()) | Err(PlayerError::NotConnected) => {}
                Err(e) => warn!("❌ Leaving guild {} failed: {}", guild, e),
            }
            self.remove(guild, &session);
        }
        info!("👋 All voice sessions closed");
    }

    fn create(&self, guild: GuildId) -> Arc<VoiceSession> {
        VoiceSession::new(
            guild,
            self.connector.clone(),
            self.resolver.clone(),
            self.notifier.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{fakes::*, JoinIntent, Phase};
    use pretty_assertions::assert_eq;
    use serenity::model::id::ChannelId;

    fn registry() -> (SessionRegistry, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let registry = SessionRegistry::new(
            connector.clone(),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeNotifier::default()),
        );
        (registry, connector)
    }

    #[test]
    fn test_get_or_create_shares_one_session_per_guild() {
        let (registry, _) = registry();
        let first = registry.get_or_create(GuildId::new(1));
        let second = registry.get_or_create(GuildId::new(1));
        let other = registry.get_or_create(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_one_session() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create(GuildId::new(7)) })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_without_session_is_not_connected() {
        let (registry, connector) = registry();

        assert!(matches!(registry.leave(GuildId::new(1)).await, Err(PlayerError::NotConnected)));
        assert_eq!(registry.len(), 0);
        assert!(connector.outputs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_leave_forgets_session() {
        let (registry, connector) = registry();
        let session = registry.get_or_create(GuildId::new(1));
        session.join(ChannelId::new(10), JoinIntent::Stay).await.unwrap();

        registry.leave(GuildId::new(1)).await.unwrap();

        assert!(registry.get(GuildId::new(1)).is_none());
        assert_eq!(session.phase().await, Phase::Disconnected);
        assert_eq!(connector.last().calls(), vec!["stop", "disconnect"]);

        let fresh = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&session, &fresh));
        assert!(!fresh.is_closed());
    }

    #[tokio::test]
    async fn test_closed_session_is_replaced() {
        let (registry, _) = registry();
        let session = registry.get_or_create(GuildId::new(1));
        session.join(ChannelId::new(10), JoinIntent::Stay).await.unwrap();
        session.leave().await.unwrap();

        let fresh = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&session, &fresh));
    }

    #[test]
    fn test_remove_only_matching_session() {
        let (registry, _) = registry();
        let stale = VoiceSession::new(
            GuildId::new(1),
            Arc::new(FakeConnector::default()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeNotifier::default()),
        );
        let current = registry.get_or_create(GuildId::new(1));

        assert!(!registry.remove(GuildId::new(1), &stale));
        assert!(registry.get(GuildId::new(1)).is_some());
        assert!(registry.remove(GuildId::new(1), &current));
        assert!(registry.get(GuildId::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_all() {
        let (registry, connector) = registry();
        for guild in 1..=3 {
            registry
                .get_or_create(GuildId::new(guild))
                .join(ChannelId::new(guild * 10), JoinIntent::Stay)
                .await
                .unwrap();
        }
        registry.get_or_create(GuildId::new(4));

        registry.shutdown_all().await;

        assert_eq!(registry.len(), 0);
        for output in connector.outputs.lock().iter() {
            assert!(output.calls().contains(&"disconnect".to_string()));
        }
    }
}
