//! Seams between a [`VoiceSession`](super::session::VoiceSession) and the
//! outside world. The bot wires these to songbird, the catalog and Discord
//! messages; tests wire them to in-memory fakes.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{Arc, Weak};

use crate::{audio::track::Track, catalog::AudioSource, error::PlayerError};

/// A connected voice channel that can play one track at a time.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Starts playing `source`, replacing anything still playing. When the
    /// track ends, for any reason, `listener` is told with `generation`.
    async fn start(
        &self,
        source: &AudioSource,
        listener: Weak<dyn TrackEndListener>,
        generation: u64,
    ) -> Result<(), PlayerError>;

    async fn pause(&self) -> Result<(), PlayerError>;

    async fn resume(&self) -> Result<(), PlayerError>;

    /// Stops the current track. Its end is still reported to the listener.
    async fn stop(&self) -> Result<(), PlayerError>;

    async fn relocate(&self, channel: ChannelId) -> Result<(), PlayerError>;

    async fn disconnect(&self) -> Result<(), PlayerError>;

    fn channel(&self) -> ChannelId;
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn AudioOutput>, PlayerError>;
}

#[async_trait]
pub trait TrackEndListener: Send + Sync {
    async fn track_ended(&self, generation: u64);

    /// The track stopped because its audio could not be decoded or read.
    async fn track_failed(&self, generation: u64, reason: String);
}

/// Turns a queued track into something the output can play.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, track: &Track) -> Result<AudioSource, PlayerError>;
}

/// Where a session reports playback progress to its listeners.
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    async fn now_playing(&self, track: &Track);

    async fn playback_failed(&self, track: &Track, error: &PlayerError);
}
