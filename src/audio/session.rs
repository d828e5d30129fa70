use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        output::{AudioOutput, SessionNotifier, SourceResolver, TrackEndListener, VoiceConnector},
        queue::{PlaybackQueue, QueuePage},
        track::Track,
    },
    error::PlayerError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

/// What `join` should do when the session already sits in another channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinIntent {
    Stay,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Moved,
    AlreadyHere,
}

struct SessionState {
    phase: Phase,
    output: Option<Arc<dyn AudioOutput>>,
    queue: PlaybackQueue,
    /// Set from the moment a track leaves the queue until its end is
    /// reported, including while its audio is still being resolved.
    current: Option<Track>,
    /// Identifies the most recently started track. End reports carrying an
    /// older number are ignored.
    generation: u64,
}

/// Voice connection, queue and playback state of one guild.
pub struct VoiceSession {
    guild: GuildId,
    me: Weak<VoiceSession>,
    connector: Arc<dyn VoiceConnector>,
    resolver: Arc<dyn SourceResolver>,
    notifier: Arc<dyn SessionNotifier>,
    state: Mutex<SessionState>,
    advancing: Mutex<()>,
    closed: AtomicBool,
}

impl VoiceSession {
    pub fn new(
        guild: GuildId,
        connector: Arc<dyn VoiceConnector>,
        resolver: Arc<dyn SourceResolver>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            guild,
            me: me.clone(),
            connector,
            resolver,
            notifier,
            state: Mutex::new(SessionState {
                phase: Phase::Disconnected,
                output: None,
                queue: PlaybackQueue::new(),
                current: None,
                generation: 0,
            }),
            advancing: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn join(&self, channel: ChannelId, intent: JoinIntent) -> Result<JoinOutcome, PlayerError> {
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(PlayerError::SessionClosed);
        }

        match state.output.clone() {
            None => {
                let output = self.connector.connect(self.guild, channel).await?;
                state.output = Some(output);
                state.phase = Phase::Idle;
                info!("🔊 Guild {} joined channel {}", self.guild, channel);
                Ok(JoinOutcome::Joined)
            }
            Some(output) if output.channel() == channel => Ok(JoinOutcome::AlreadyHere),
            Some(output) => match intent {
                JoinIntent::Stay => Err(PlayerError::AlreadyConnected(output.channel())),
                JoinIntent::Move => {
                    output.relocate(channel).await?;
                    info!("🔀 Guild {} moved to channel {}", self.guild, channel);
                    Ok(JoinOutcome::Moved)
                }
            },
        }
    }

    /// Queues `track`. Returns its queue position, or 0 when it started
    /// playing right away.
    pub async fn enqueue(&self, track: Track) -> Result<usize, PlayerError> {
        let idle = {
            let mut state = self.state.lock().await;
            if self.is_closed() {
                return Err(PlayerError::SessionClosed);
            }
            if state.output.is_none() {
                return Err(PlayerError::NotConnected);
            }

            let position = state.queue.enqueue(track);
            if state.current.is_none() && state.phase == Phase::Idle {
                None
            } else {
                Some(position)
            }
        };

        match idle {
            Some(position) => Ok(position),
            None => {
                self.advance().await;
                Ok(0)
            }
        }
    }

    /// Starts the next playable track if nothing is current. Tracks whose
    /// audio cannot be resolved or started are reported and skipped.
    pub async fn advance(&self) {
        let _advancing = self.advancing.lock().await;

        loop {
            let (track, output, generation) = {
                let mut state = self.state.lock().await;
                if self.is_closed() || state.current.is_some() {
                    return;
                }
                let Some(output) = state.output.clone() else {
                    return;
                };

                match state.queue.dequeue() {
                    Ok(track) => {
                        state.generation += 1;
                        state.current = Some(track.clone());
                        (track, output, state.generation)
                    }
                    Err(_) => {
                        state.phase = Phase::Idle;
                        debug!("📭 Queue of guild {} is exhausted", self.guild);
                        return;
                    }
                }
            };

            match self.start(&track, output.as_ref(), generation).await {
                Ok(()) => {
                    let mut state = self.state.lock().await;
                    if self.is_closed() || state.generation != generation {
                        // Stopped while the track was loading.
                        drop(state);
                        if let Err(e) = output.stop().await {
                            debug!("Stopping superseded track failed: {}", e);
                        }
                        return;
                    }
                    state.phase = Phase::Playing;
                    drop(state);

                    info!("🎵 Guild {} now playing: {}", self.guild, track.title);
                    self.notifier.now_playing(&track).await;
                    return;
                }
                Err(e) => {
                    warn!("❌ Could not play {} in guild {}: {}", track.title, self.guild, e);
                    {
                        let mut state = self.state.lock().await;
                        if state.generation == generation {
                            state.current = None;
                        }
                    }
                    self.notifier.playback_failed(&track, &e).await;
                }
            }
        }
    }

    async fn start(&self, track: &Track, output: &dyn AudioOutput, generation: u64) -> Result<(), PlayerError> {
        let source = self.resolver.resolve(track).await?;
        let listener: Weak<dyn TrackEndListener> = self.me.clone();
        output.start(&source, listener, generation).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Playing {
            return Err(PlayerError::NotPlaying);
        }
        let output = state.output.clone().ok_or(PlayerError::NotConnected)?;
        output.pause().await?;
        state.phase = Phase::Paused;
        info!("⏸️ Guild {} paused", self.guild);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Paused {
            return Err(PlayerError::NotPlaying);
        }
        let output = state.output.clone().ok_or(PlayerError::NotConnected)?;
        output.resume().await?;
        state.phase = Phase::Playing;
        info!("▶️ Guild {} resumed", self.guild);
        Ok(())
    }

    /// Stops the current track. Playback moves on once the output reports
    /// the end of the stopped track. Returns the skipped track.
    pub async fn skip(&self) -> Result<Track, PlayerError> {
        let state = self.state.lock().await;
        if !matches!(state.phase, Phase::Playing | Phase::Paused) {
            return Err(PlayerError::NotPlaying);
        }
        let current = state.current.clone().ok_or(PlayerError::NotPlaying)?;
        let output = state.output.clone().ok_or(PlayerError::NotConnected)?;
        output.stop().await?;
        info!("⏭️ Guild {} skipped {}", self.guild, current.title);
        Ok(current)
    }

    /// Clears the queue and stops playback. Returns how many queued tracks
    /// were dropped.
    pub async fn stop(&self) -> Result<usize, PlayerError> {
        let mut state = self.state.lock().await;
        let output = state.output.clone().ok_or(PlayerError::NotConnected)?;

        let dropped = state.queue.clear();
        let had_current = state.current.take().is_some();
        state.generation += 1;
        state.phase = Phase::Idle;

        if had_current {
            output.stop().await?;
        }
        info!("⏹️ Guild {} stopped", self.guild);
        Ok(dropped)
    }

    pub async fn shuffle(&self) -> Result<usize, PlayerError> {
        let mut state = self.state.lock().await;
        if state.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        state.queue.shuffle();
        Ok(state.queue.size())
    }

    /// Removes the queued track at 0-based `index`.
    pub async fn remove(&self, index: usize) -> Result<Track, PlayerError> {
        self.state.lock().await.queue.remove_at(index)
    }

    pub async fn queue_page(&self, page: usize, per_page: usize) -> QueuePage {
        self.state.lock().await.queue.page(page, per_page)
    }

    pub async fn now_playing(&self) -> Option<Track> {
        self.state.lock().await.current.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn channel(&self) -> Option<ChannelId> {
        self.state.lock().await.output.as_ref().map(|output| output.channel())
    }

    /// Drops the queue, stops playback and disconnects. The session is
    /// closed for good afterwards.
    pub async fn leave(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        let output = state.output.take().ok_or(PlayerError::NotConnected)?;

        self.closed.store(true, Ordering::Release);
        state.queue.clear();
        state.current = None;
        state.generation += 1;
        state.phase = Phase::Disconnected;
        drop(state);

        if let Err(e) = output.stop().await {
            debug!("Stopping output of guild {} failed: {}", self.guild, e);
        }
        output.disconnect().await?;
        info!("👋 Guild {} left voice", self.guild);
        Ok(())
    }
}

#[async_trait]
impl TrackEndListener for VoiceSession {
    async fn track_ended(&self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if self.is_closed() || state.generation != generation {
                debug!("Ignoring stale end of track #{} in guild {}", generation, self.guild);
                return;
            }
            state.current = None;
            state.phase = Phase::Idle;
        }
        self.advance().await;
    }

    async fn track_failed(&self, generation: u64, reason: String) {
        let track = {
            let mut state = self.state.lock().await;
            if self.is_closed() || state.generation != generation {
                debug!("Ignoring stale failure of track #{} in guild {}", generation, self.guild);
                return;
            }
            state.phase = Phase::Idle;
            state.current.take()
        };

        if let Some(track) = track {
            warn!("❌ Playback of {} failed in guild {}: {}", track.title, self.guild, reason);
            self.notifier.playback_failed(&track, &PlayerError::Output(reason)).await;
        }
        self.advance().await;
    }
}


#[cfg(test)]
mod tests {
    use super::{fakes::*, *};
    use crate::audio::queue::tests::track;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    struct Harness {
        session: Arc<VoiceSession>,
        connector: Arc<FakeConnector>,
        notifier: Arc<FakeNotifier>,
    }

    fn harness(broken: &[u64]) -> Harness {
        let connector = Arc::new(FakeConnector::default());
        let notifier = Arc::new(FakeNotifier::default());
        let resolver = Arc::new(FakeResolver {
            broken: broken.iter().copied().collect::<HashSet<_>>(),
        });
        let session = VoiceSession::new(GuildId::new(1), connector.clone(), resolver, notifier.clone());
        Harness {
            session,
            connector,
            notifier,
        }
    }

    async fn joined(broken: &[u64]) -> Harness {
        let harness = harness(broken);
        harness
            .session
            .join(ChannelId::new(100), JoinIntent::Stay)
            .await
            .unwrap();
        harness
    }

    #[tokio::test]
    async fn test_join_connects_once() {
        let h = harness(&[]);
        assert_eq!(h.session.phase().await, Phase::Disconnected);

        let outcome = h.session.join(ChannelId::new(100), JoinIntent::Stay).await.unwrap();
        assert_eq!(outcome, JoinOutcome::Joined);
        assert_eq!(h.session.phase().await, Phase::Idle);

        let again = h.session.join(ChannelId::new(100), JoinIntent::Stay).await.unwrap();
        assert_eq!(again, JoinOutcome::AlreadyHere);
        assert_eq!(h.connector.outputs.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_join_other_channel_depends_on_intent() {
        let h = joined(&[]).await;

        let stay = h.session.join(ChannelId::new(200), JoinIntent::Stay).await;
        assert!(matches!(stay, Err(PlayerError::AlreadyConnected(c)) if c == ChannelId::new(100)));

        let moved = h.session.join(ChannelId::new(200), JoinIntent::Move).await.unwrap();
        assert_eq!(moved, JoinOutcome::Moved);
        assert_eq!(h.session.channel().await, Some(ChannelId::new(200)));
        assert_eq!(h.connector.last().calls(), vec!["relocate 200"]);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_session_disconnected() {
        let connector = Arc::new(FakeConnector {
            fail: true,
            ..Default::default()
        });
        let session = VoiceSession::new(
            GuildId::new(1),
            connector,
            Arc::new(FakeResolver::default()),
            Arc::new(FakeNotifier::default()),
        );

        let result = session.join(ChannelId::new(100), JoinIntent::Stay).await;
        assert!(matches!(result, Err(PlayerError::Connect(_))));
        assert_eq!(session.phase().await, Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_enqueue_requires_connection() {
        let h = harness(&[]);
        assert!(matches!(h.session.enqueue(track(1)).await, Err(PlayerError::NotConnected)));
        assert_eq!(h.session.queue_page(1, 10).await.total_items, 0);
    }

    #[tokio::test]
    async fn test_first_track_starts_immediately() {
        let h = joined(&[]).await;

        assert_eq!(h.session.enqueue(track(1)).await.unwrap(), 0);
        assert_eq!(h.session.enqueue(track(2)).await.unwrap(), 1);
        assert_eq!(h.session.enqueue(track(3)).await.unwrap(), 2);

        assert_eq!(h.session.phase().await, Phase::Playing);
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(1));
        assert_eq!(h.connector.last().calls(), vec!["start http://example.com/1.mp3"]);
        assert_eq!(h.notifier.events(), vec!["playing 1"]);
    }

    #[tokio::test]
    async fn test_track_end_advances_in_order() {
        let h = joined(&[]).await;
        for id in 1..=3 {
            h.session.enqueue(track(id)).await.unwrap();
        }
        let output = h.connector.last();

        output.finish().await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
        output.finish().await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(3));
        output.finish().await;

        assert_eq!(h.session.now_playing().await, None);
        assert_eq!(h.session.phase().await, Phase::Idle);
        assert_eq!(h.notifier.events(), vec!["playing 1", "playing 2", "playing 3"]);
    }

    #[tokio::test]
    async fn test_stale_end_is_ignored() {
        let h = joined(&[]).await;
        h.session.enqueue(track(1)).await.unwrap();
        h.session.enqueue(track(2)).await.unwrap();
        let output = h.connector.last();
        let first = output.generation().unwrap();

        output.finish().await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));

        // A late report for the first track must not skip the second.
        output.finish_generation(first).await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
        assert_eq!(h.session.phase().await, Phase::Playing);
    }

    #[tokio::test]
    async fn test_unplayable_only_track_returns_to_idle() {
        let h = joined(&[1]).await;

        h.session.enqueue(track(1)).await.unwrap();
        assert_eq!(h.session.phase().await, Phase::Idle);
        assert_eq!(h.session.now_playing().await, None);
        assert_eq!(h.notifier.events(), vec!["failed 1"]);

        h.session.enqueue(track(2)).await.unwrap();
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
    }

    #[tokio::test]
    async fn test_unplayable_track_is_skipped() {
        let h = joined(&[2]).await;
        h.session.enqueue(track(1)).await.unwrap();
        h.session.enqueue(track(2)).await.unwrap();
        h.session.enqueue(track(3)).await.unwrap();

        h.connector.last().finish().await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(3));
        assert_eq!(h.notifier.events(), vec!["playing 1", "failed 2", "playing 3"]);
    }

    #[tokio::test]
    async fn test_broken_stream_is_reported_and_skipped() {
        let h = joined(&[]).await;
        h.session.enqueue(track(1)).await.unwrap();
        h.session.enqueue(track(2)).await.unwrap();
        let output = h.connector.last();
        let first = output.generation().unwrap();

        output.fail("corrupt frame").await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
        assert_eq!(h.session.phase().await, Phase::Playing);
        assert_eq!(h.notifier.events(), vec!["playing 1", "failed 1", "playing 2"]);

        // The end event that follows an error belongs to a finished generation.
        output.finish_generation(first).await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let h = joined(&[]).await;

        assert!(matches!(h.session.pause().await, Err(PlayerError::NotPlaying)));
        assert_eq!(h.session.phase().await, Phase::Idle);
        assert!(matches!(h.session.resume().await, Err(PlayerError::NotPlaying)));

        h.session.enqueue(track(1)).await.unwrap();
        h.session.pause().await.unwrap();
        assert_eq!(h.session.phase().await, Phase::Paused);
        assert!(matches!(h.session.pause().await, Err(PlayerError::NotPlaying)));

        h.session.resume().await.unwrap();
        assert_eq!(h.session.phase().await, Phase::Playing);
        assert_eq!(
            h.connector.last().calls(),
            vec!["start http://example.com/1.mp3", "pause", "resume"]
        );
    }

    #[tokio::test]
    async fn test_skip_waits_for_track_end() {
        let h = joined(&[]).await;
        assert!(matches!(h.session.skip().await, Err(PlayerError::NotPlaying)));

        h.session.enqueue(track(1)).await.unwrap();
        h.session.enqueue(track(2)).await.unwrap();

        assert_eq!(h.session.skip().await.unwrap().id, 1);
        let output = h.connector.last();
        assert_eq!(output.calls().last().map(String::as_str), Some("stop"));

        output.finish().await;
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(2));
    }

    #[tokio::test]
    async fn test_stop_clears_everything() {
        let h = joined(&[]).await;
        for id in 1..=3 {
            h.session.enqueue(track(id)).await.unwrap();
        }
        let output = h.connector.last();

        assert_eq!(h.session.stop().await.unwrap(), 2);
        // The end of the stopped track does not start anything.
        output.finish().await;

        assert_eq!(h.session.phase().await, Phase::Idle);
        assert_eq!(h.session.now_playing().await, None);
        assert_eq!(h.session.queue_page(1, 10).await.total_items, 0);

        assert_eq!(h.session.enqueue(track(4)).await.unwrap(), 0);
        assert_eq!(h.session.now_playing().await.map(|t| t.id), Some(4));
    }

    #[tokio::test]
    async fn test_shuffle_and_remove() {
        let h = joined(&[]).await;
        assert!(matches!(h.session.shuffle().await, Err(PlayerError::EmptyQueue)));

        for id in 1..=4 {
            h.session.enqueue(track(id)).await.unwrap();
        }
        assert_eq!(h.session.shuffle().await.unwrap(), 3);

        let removed = h.session.remove(0).await.unwrap();
        assert_ne!(removed.id, 1);
        assert!(matches!(
            h.session.remove(5).await,
            Err(PlayerError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[tokio::test]
    async fn test_leave_closes_session() {
        let h = joined(&[]).await;
        h.session.enqueue(track(1)).await.unwrap();
        h.session.enqueue(track(2)).await.unwrap();
        let output = h.connector.last();

        h.session.leave().await.unwrap();
        assert!(h.session.is_closed());
        assert_eq!(h.session.phase().await, Phase::Disconnected);
        assert_eq!(output.calls()[1..], ["stop".to_string(), "disconnect".to_string()]);

        output.finish().await;
        assert_eq!(h.session.now_playing().await, None);

        assert!(matches!(
            h.session.join(ChannelId::new(100), JoinIntent::Stay).await,
            Err(PlayerError::SessionClosed)
        ));
        assert!(matches!(h.session.enqueue(track(3)).await, Err(PlayerError::SessionClosed)));
        assert!(matches!(h.session.leave().await, Err(PlayerError::NotConnected)));
    }
}
