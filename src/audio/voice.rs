use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::{ControlError, JoinError},
    input::{File, HttpRequest, Input},
    tracks::{PlayMode, Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{
    audio::output::{AudioOutput, TrackEndListener, VoiceConnector},
    catalog::AudioSource,
    error::PlayerError,
};

/// Gain applied to every track. Full scale clips on loud masters.
pub const PLAYBACK_VOLUME: f32 = 0.75;

fn playback_track(input: Input) -> Track {
    Track::new(input).volume(PLAYBACK_VOLUME)
}

/// Opens songbird calls. Streamed tracks are fetched with `http`.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn AudioOutput>, PlayerError> {
        let call = self.manager.join(guild, channel).await.map_err(|e| {
            error!("❌ Joining channel {} in guild {} failed: {:?}", channel, guild, e);
            PlayerError::Connect(e.to_string())
        })?;

        Ok(Arc::new(SongbirdOutput {
            manager: self.manager.clone(),
            guild,
            call,
            channel: SyncMutex::new(channel),
            http: self.http.clone(),
            current: SyncMutex::new(None),
        }))
    }
}

/// A songbird call playing at most one track at a time.
pub struct SongbirdOutput {
    manager: Arc<Songbird>,
    guild: GuildId,
    call: Arc<Mutex<Call>>,
    channel: SyncMutex<ChannelId>,
    http: reqwest::Client,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdOutput {
    fn input(&self, source: &AudioSource) -> Input {
        match source {
            AudioSource::File(path) => File::new(path.clone()).into(),
            AudioSource::Url(url) => HttpRequest::new(self.http.clone(), url.clone()).into(),
        }
    }

    fn current(&self) -> Result<TrackHandle, PlayerError> {
        self.current.lock().clone().ok_or(PlayerError::NotPlaying)
    }
}

fn control_error(e: ControlError) -> PlayerError {
    PlayerError::Output(e.to_string())
}

#[async_trait]
impl AudioOutput for SongbirdOutput {
    async fn start(
        &self,
        source: &AudioSource,
        listener: Weak<dyn TrackEndListener>,
        generation: u64,
    ) -> Result<(), PlayerError> {
        let input = self.input(source);

        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play(playback_track(input))
        };

        let handler = TrackEndHandler { listener, generation };
        handle
            .add_event(Event::Track(TrackEvent::End), handler.clone())
            .map_err(control_error)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), handler)
            .map_err(control_error)?;

        debug!("🎧 Guild {} started track #{}", self.guild, generation);
        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.current()?.pause().map_err(control_error)
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.current()?.play().map_err(control_error)
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        let Some(handle) = self.current.lock().take() else {
            return Ok(());
        };
        match handle.stop() {
            Ok(()) | Err(ControlError::Finished) => Ok(()),
            Err(e) => Err(control_error(e)),
        }
    }

    async fn relocate(&self, channel: ChannelId) -> Result<(), PlayerError> {
        self.manager
            .join(self.guild, channel)
            .await
            .map_err(|e| PlayerError::Connect(e.to_string()))?;
        *self.channel.lock() = channel;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        match self.manager.remove(self.guild).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Disconnected from voice in guild {}", self.guild);
                Ok(())
            }
            Err(e) => Err(PlayerError::Connect(e.to_string())),
        }
    }

    fn channel(&self) -> ChannelId {
        *self.channel.lock()
    }
}

/// Forwards the end (or failure) of one songbird track to its session.
#[derive(Clone)]
struct TrackEndHandler {
    listener: Weak<dyn TrackEndListener>,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut failure = None;
        if let EventContext::Track(states) = ctx {
            for (state, _) in states.iter() {
                debug!("Track #{} finished as {:?}", self.generation, state.playing);
                if let PlayMode::Errored(e) = &state.playing {
                    failure = Some(format!("{e:?}"));
                }
            }
        }

        // Resolving the next track can take a while; keep the driver's
        // event loop free.
        if let Some(listener) = self.listener.upgrade() {
            let generation = self.generation;
            tokio::spawn(async move {
                match failure {
                    Some(reason) => listener.track_failed(generation, reason).await,
                    None => listener.track_ended(generation).await,
                }
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_play_below_full_scale() {
        let track = playback_track(File::new("song.mp3").into());
        assert_eq!(track.volume, PLAYBACK_VOLUME);
        assert_eq!(track.volume, 0.75);
    }
}
