use serenity::model::id::{ChannelId, UserId};
use std::{path::PathBuf, time::Duration};

use crate::{
    catalog::{models, Album, Artist, AudioSource, Song},
    ui::format,
};

/// Where a queued track's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Resolved against the catalog right before playback.
    Deferred,
    Stream(String),
    File(PathBuf),
}

impl From<AudioSource> for TrackSource {
    fn from(source: AudioSource) -> Self {
        match source {
            AudioSource::Url(url) => TrackSource::Stream(url),
            AudioSource::File(path) => TrackSource::File(path),
        }
    }
}

/// A song waiting in (or playing from) a guild queue, together with who
/// asked for it and where to report on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub duration: Duration,
    pub source: TrackSource,
    pub requester: UserId,
    pub channel: ChannelId,
}

impl Track {
    pub fn new(song: &Song, source: TrackSource, requester: UserId, channel: ChannelId) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artists: song.artists.clone(),
            album: song.album.clone(),
            duration: song.duration(),
            source,
            requester,
            channel,
        }
    }

    pub fn artist_names(&self) -> String {
        models::join_artists(&self.artists)
    }

    pub fn length(&self) -> String {
        format::format_duration(self.duration)
    }

    pub fn page_url(&self) -> String {
        format!("https://music.163.com/#/song?id={}", self.id)
    }

    pub fn file_stem(&self) -> String {
        models::file_stem(&self.artists, &self.title)
    }
}
