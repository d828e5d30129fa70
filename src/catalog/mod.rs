//! # Catalog Module
//!
//! Client for the NetEase Cloud Music API gateway.
//!
//! Every response is mapped into the typed records of [`models`]; nothing is
//! cached, so each lookup hits the gateway. Provider failures (non-200
//! `code`, empty result sets, refused downloads) surface as
//! [`CatalogError::Lookup`], network failures as
//! [`CatalogError::Transport`]. Nothing is retried.
//!
//! ```rust,ignore
//! use crate::catalog::{CatalogClient, HttpTransport};
//! use std::sync::Arc;
//!
//! # async fn example(config: &crate::config::Config) -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTransport::new(config)?);
//! let catalog = CatalogClient::new(transport, config.download_dir.clone(), config.bitrate, config.download);
//! let page = catalog.search("晴天", 10, 0).await?;
//! let source = catalog.resolve_audio_source(page.songs[0].id, &page.songs[0].file_stem(), 320_000, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod transport;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    io::Write,
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, info, warn};

pub use models::{
    Album, Artist, Comment, CommentPage, FeeTier, LoginStatus, LyricBlock, Playlist, SearchPage, Song, SongFile,
    UserProfile,
};
pub use transport::{CatalogTransport, HttpTransport};

use crate::{
    audio::{
        output::SourceResolver,
        track::{Track, TrackSource},
    },
    error::{CatalogError, PlayerError},
    ui::format::format_size,
};
use models::{
    Envelope, RawCommentResponse, RawLoginStatusResponse, RawLyricResponse, RawPlaylistResponse,
    RawSearchResponse, RawSongDetailResponse, RawSongFileResponse, RawUserDetailResponse,
};
use transport::Query;

/// Where the voice driver should read a track from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    Url(String),
    File(PathBuf),
}

pub struct CatalogClient {
    transport: Arc<dyn CatalogTransport>,
    download_dir: PathBuf,
    bitrate: u32,
    download: bool,
    /// One lock per destination file, so two requests for the same track
    /// never write the same path at once.
    downloads: DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn CatalogTransport>, download_dir: PathBuf, bitrate: u32, download: bool) -> Self {
        Self {
            transport,
            download_dir,
            bitrate,
            download,
            downloads: DashMap::new(),
        }
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn downloads_enabled(&self) -> bool {
        self.download
    }

    /// Keyword search over songs.
    pub async fn search(&self, keywords: &str, limit: usize, offset: usize) -> Result<SearchPage, CatalogError> {
        let response: RawSearchResponse = self
            .fetch(
                "search",
                vec![
                    ("keywords", keywords.to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                    ("type", "1".to_string()),
                ],
            )
            .await?;

        let result = response
            .result
            .ok_or_else(|| CatalogError::Lookup(format!("no results for `{keywords}`")))?;
        if result.songs.is_empty() {
            return Err(CatalogError::Lookup(format!("no results for `{keywords}`")));
        }

        let songs: Vec<Song> = result.songs.into_iter().map(Song::from).collect();
        info!("🔍 `{}`: {} of {} results", keywords, songs.len(), result.song_count);
        Ok(SearchPage {
            total: result.song_count.max(songs.len() as u64),
            songs,
        })
    }

    pub async fn song(&self, id: u64) -> Result<Song, CatalogError> {
        self.songs(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::Lookup(format!("song {id} does not exist")))
    }

    /// Batched `song/detail`. Unknown ids are silently missing from the
    /// result, in request order otherwise.
    pub async fn songs(&self, ids: &[u64]) -> Result<Vec<Song>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let response: RawSongDetailResponse = self.fetch("song/detail", vec![("ids", joined)]).await?;

        let mut songs: Vec<Song> = response.songs.into_iter().map(Song::from).collect();
        songs.sort_by_key(|song| ids.iter().position(|id| *id == song.id));
        Ok(songs)
    }

    /// Download descriptor for `id` at (up to) `bitrate`. Fails when the
    /// provider withholds the file, e.g. for VIP-only tracks.
    pub async fn song_file(&self, id: u64, bitrate: u32) -> Result<SongFile, CatalogError> {
        let response: RawSongFileResponse = self
            .fetch("song/url", vec![("id", id.to_string()), ("br", bitrate.to_string())])
            .await?;

        let raw = response
            .data
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| CatalogError::Lookup(format!("no audio file for song {id}")))?;

        if raw.code.is_some_and(|code| code != 200) {
            return Err(CatalogError::Lookup(format!(
                "audio for song {id} is unavailable (code {})",
                raw.code.unwrap_or_default()
            )));
        }

        let file = SongFile::from(raw);
        if file.url.is_none() {
            return Err(CatalogError::Lookup(format!(
                "audio for song {id} is unavailable ({})",
                file.fee.label()
            )));
        }

        debug!(
            "🎧 Song {}: {} {}kbps, {} bytes",
            id, file.container, file.bitrate_kbps, file.size
        );
        Ok(file)
    }

    /// Resolves a bare id or a song link (`...song?id=123`).
    pub async fn song_by_reference(&self, reference: &str) -> Result<Song, CatalogError> {
        let id = parse_reference(reference)?;
        self.song(id).await
    }

    /// Candidates for a user query: the single referenced song when the
    /// query is an id or link, search results otherwise. A bare number that
    /// names no song (`1989`) is searched as a phrase.
    pub async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Song>, CatalogError> {
        let Ok(id) = parse_reference(query) else {
            return Ok(self.search(query, limit, 0).await?.songs);
        };

        let bare_number = query.trim().bytes().all(|b| b.is_ascii_digit());
        match self.song(id).await {
            Ok(song) => Ok(vec![song]),
            Err(CatalogError::Lookup(reason)) if bare_number => {
                debug!("No song with id {} ({}), searching instead", id, reason);
                Ok(self.search(query.trim(), limit, 0).await?.songs)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn playlist(&self, reference: &str) -> Result<Playlist, CatalogError> {
        let id = parse_reference(reference)?;
        let response: RawPlaylistResponse = self.fetch("playlist/detail", vec![("id", id.to_string())]).await?;

        let playlist: Playlist = response
            .playlist
            .ok_or_else(|| CatalogError::Lookup(format!("playlist {id} does not exist")))?
            .into();

        if playlist.track_ids.is_empty() {
            return Err(CatalogError::Lookup(format!("playlist {id} is empty")));
        }
        Ok(playlist)
    }

    pub async fn lyric(&self, id: u64) -> Result<LyricBlock, CatalogError> {
        let response: RawLyricResponse = self.fetch("lyric", vec![("id", id.to_string())]).await?;
        Ok(response.into())
    }

    pub async fn comments(&self, id: u64, limit: usize) -> Result<CommentPage, CatalogError> {
        let response: RawCommentResponse = self
            .fetch("comment/music", vec![("id", id.to_string()), ("limit", limit.to_string())])
            .await?;
        Ok(response.into())
    }

    /// Whether the configured cookie belongs to a logged-in account.
    pub async fn login_status(&self) -> Result<LoginStatus, CatalogError> {
        // Not logged in is a normal answer here, so the envelope code is not
        // treated as a failure.
        let value = self.transport.get_json("login/status", Vec::new()).await?;
        let response: RawLoginStatusResponse = serde_json::from_value(value)?;
        Ok(response.into())
    }

    pub async fn user(&self, uid: u64) -> Result<UserProfile, CatalogError> {
        let response: RawUserDetailResponse = self.fetch("user/detail", vec![("uid", uid.to_string())]).await?;
        response
            .into_profile()
            .ok_or_else(|| CatalogError::Lookup(format!("user {uid} does not exist")))
    }

    /// Returns a streamable URL, or with `download` set, makes sure the
    /// audio is stored as `<download_dir>/<stem>.<container>` and returns
    /// that path. An existing file is reused without downloading again.
    pub async fn resolve_audio_source(
        &self,
        id: u64,
        stem: &str,
        bitrate: u32,
        download: bool,
    ) -> Result<AudioSource, CatalogError> {
        let file = self.song_file(id, bitrate).await?;
        let url = file
            .url
            .ok_or_else(|| CatalogError::Lookup(format!("audio for song {id} is unavailable")))?;

        if !download {
            return Ok(AudioSource::Url(url));
        }

        let path = self.download_dir.join(format!("{stem}.{}", file.container));
        let slot = DownloadSlot::claim(&self.downloads, path.clone());
        let _guard = slot.lock.lock().await;

        if tokio::fs::try_exists(&path).await? {
            info!("📁 Reusing {}", path.display());
            return Ok(AudioSource::File(path));
        }

        info!("⬇️ Downloading {} ({})", path.display(), format_size(file.size));
        let bytes = self.transport.get_bytes(&url).await.inspect_err(|e| {
            warn!("❌ Download of song {} failed: {}", id, e);
        })?;
        persist(self.download_dir.clone(), path.clone(), bytes).await?;
        info!("✅ Downloaded {}", path.display());
        Ok(AudioSource::File(path))
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &'static str, query: Query) -> Result<T, CatalogError> {
        let value = self.transport.get_json(endpoint, query).await.inspect_err(|e| {
            warn!("❌ Catalog request {} failed: {}", endpoint, e);
        })?;

        let envelope = Envelope::deserialize(&value)?;
        if !envelope.is_ok() {
            let reason = envelope.reason();
            warn!("❌ Catalog {} refused: {}", endpoint, reason);
            return Err(CatalogError::Lookup(reason));
        }

        serde_json::from_value(value).map_err(|e| {
            warn!("❌ Unexpected {} response: {}", endpoint, e);
            CatalogError::Decode(e)
        })
    }
}

#[async_trait]
impl SourceResolver for CatalogClient {
    async fn resolve(&self, track: &Track) -> Result<AudioSource, PlayerError> {
        match &track.source {
            TrackSource::Stream(url) => Ok(AudioSource::Url(url.clone())),
            TrackSource::File(path) => Ok(AudioSource::File(path.clone())),
            TrackSource::Deferred => Ok(self
                .resolve_audio_source(track.id, &track.file_stem(), self.bitrate, self.download)
                .await?),
        }
    }
}

/// Extracts a catalog id from a bare number or any link carrying `id=<n>`,
/// including the fragment style `https://music.163.com/#/song?id=1`.
pub fn parse_reference(reference: &str) -> Result<u64, CatalogError> {
    let reference = reference.trim();
    let invalid = || CatalogError::InvalidReference(reference.to_string());

    if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
        return reference.parse().map_err(|_| invalid());
    }

    let pattern = Regex::new(r"\Wid=(\d+)").map_err(|_| invalid())?;
    pattern
        .captures(reference)
        .and_then(|captures| captures.get(1))
        .and_then(|id| id.as_str().parse().ok())
        .ok_or_else(invalid)
}

/// Per-path download lock. The map entry is dropped by the last holder,
/// whichever way its download ended.
struct DownloadSlot<'a> {
    downloads: &'a DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>,
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> DownloadSlot<'a> {
    fn claim(downloads: &'a DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>, path: PathBuf) -> Self {
        let lock = downloads
            .entry(path.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self { downloads, path, lock }
    }
}

impl Drop for DownloadSlot<'_> {
    fn drop(&mut self) {
        // One reference lives in the map and one here; more means another
        // request is still waiting on this path.
        self.downloads
            .remove_if(&self.path, |_, lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) <= 2);
    }
}

/// Writes to a temporary file next to `path` and renames it into place, so
/// a reader never sees a half-written file.
async fn persist(dir: PathBuf, path: PathBuf, bytes: Bytes) -> Result<(), CatalogError> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}
