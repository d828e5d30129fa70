use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{audio::track::Track, error::PlayerError};

/// Pending tracks of one guild, in play order. The track currently playing
/// is not part of the queue.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: VecDeque<Track>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track and returns its 1-based position.
    pub fn enqueue(&mut self, track: Track) -> usize {
        debug!("➕ Queued: {}", track.title);
        self.items.push_back(track);
        self.items.len()
    }

    /// Takes the track at the head of the queue.
    pub fn dequeue(&mut self) -> Result<Track, PlayerError> {
        let track = self.items.pop_front().ok_or(PlayerError::EmptyQueue)?;
        debug!("➡️ Next in queue: {}", track.title);
        Ok(track)
    }

    /// Tracks in `start..end`, clamped to the queue, without removing them.
    pub fn peek_range(&self, start: usize, end: usize) -> Vec<Track> {
        self.items
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned()
            .collect()
    }

    /// Pages are 1-based; a page past the end is clamped to the last page.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_pages = self.items.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;

        QueuePage {
            items: self.peek_range(start, start + per_page),
            offset: start,
            current_page,
            total_pages,
            total_items: self.items.len(),
            total_duration: self.total_duration(),
        }
    }

    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Queue shuffled ({} tracks)", self.items.len());
    }

    /// Removes the track at 0-based `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        let len = self.items.len();
        let track = self
            .items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        debug!("❌ Removed {} from position {}", track.title, index + 1);
        Ok(track)
    }

    /// Empties the queue and returns how many tracks were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        if dropped > 0 {
            info!("🗑️ Queue cleared ({} tracks)", dropped);
        }
        dropped
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(|track| track.duration).sum()
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    /// Queue index of `items[0]`.
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        audio::track::TrackSource,
        catalog::{Album, Artist},
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, UserId};

    pub(crate) fn track(id: u64) -> Track {
        Track {
            id,
            title: format!("Track {id}"),
            artists: vec![Artist { id: 1, name: "Tester".to_string() }],
            album: Album { id: 1, name: "Tests".to_string(), picture_url: None, publish_time: None },
            duration: Duration::from_secs(180),
            source: TrackSource::Stream(format!("http://example.com/{id}.mp3")),
            requester: UserId::new(10),
            channel: ChannelId::new(20),
        }
    }

    fn queue_of(ids: impl IntoIterator<Item = u64>) -> PlaybackQueue {
        let mut queue = PlaybackQueue::new();
        for id in ids {
            queue.enqueue(track(id));
        }
        queue
    }

    fn ids(tracks: &[Track]) -> Vec<u64> {
        tracks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = queue_of([1, 2, 3]);
        assert_eq!(queue.dequeue().unwrap().id, 1);
        assert_eq!(queue.dequeue().unwrap().id, 2);
        assert_eq!(queue.dequeue().unwrap().id, 3);
        assert!(matches!(queue.dequeue(), Err(PlayerError::EmptyQueue)));
    }

    #[test]
    fn test_enqueue_reports_position() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(queue.enqueue(track(1)), 1);
        assert_eq!(queue.enqueue(track(2)), 2);
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn test_size_tracks_interleaved_operations() {
        let mut queue = queue_of([1, 2, 3]);
        assert_eq!(queue.dequeue().unwrap().id, 1);
        assert_eq!(queue.size(), 2);

        queue.enqueue(track(4));
        queue.enqueue(track(5));
        assert_eq!(queue.size(), 4);

        assert_eq!(queue.dequeue().unwrap().id, 2);
        assert_eq!(queue.dequeue().unwrap().id, 3);
        queue.enqueue(track(6));
        assert_eq!(queue.size(), 3);
        assert_eq!(ids(&queue.peek_range(0, 3)), vec![4, 5, 6]);

        for expected in [4, 5, 6] {
            assert_eq!(queue.dequeue().unwrap().id, expected);
        }
        assert_eq!(queue.size(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let queue = queue_of([1, 2, 3, 4]);
        assert_eq!(ids(&queue.peek_range(1, 3)), vec![2, 3]);
        assert_eq!(ids(&queue.peek_range(3, 10)), vec![4]);
        assert!(queue.peek_range(9, 12).is_empty());
        assert!(queue.peek_range(3, 1).is_empty());
        assert_eq!(queue.size(), 4);
    }

    #[test]
    fn test_pages() {
        let queue = queue_of(1..=25);

        let first = queue.page(1, 10);
        assert_eq!(ids(&first.items), (1..=10).collect::<Vec<_>>());
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.offset, 0);
        assert_eq!(first.total_duration, Duration::from_secs(25 * 180));

        let last = queue.page(3, 10);
        assert_eq!(ids(&last.items), (21..=25).collect::<Vec<_>>());
        assert_eq!(last.offset, 20);

        let clamped = queue.page(7, 10);
        assert_eq!(clamped.current_page, 3);
        assert_eq!(queue.page(0, 10).current_page, 1);
    }

    #[test]
    fn test_empty_queue_has_one_page() {
        let page = PlaybackQueue::new().page(1, 10);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.total_duration, Duration::ZERO);
    }

    #[test]
    fn test_shuffle_keeps_tracks() {
        let mut queue = queue_of(1..=50);
        queue.shuffle();

        let mut shuffled = ids(&queue.peek_range(0, 50));
        assert_eq!(shuffled.len(), 50);
        shuffled.sort_unstable();
        assert_eq!(shuffled, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_remove_at() {
        let mut queue = queue_of([1, 2, 3]);
        assert_eq!(queue.remove_at(1).unwrap().id, 2);
        assert_eq!(ids(&queue.peek_range(0, 3)), vec![1, 3]);
        assert!(matches!(
            queue.remove_at(2),
            Err(PlayerError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_clear_reports_count() {
        let mut queue = queue_of([1, 2]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }
}
