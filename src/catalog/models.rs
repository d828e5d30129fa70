//! Normalized catalog records and the provider JSON they are built from.
//!
//! The provider's responses differ between API gateway versions, so every
//! provider field that is not needed to identify a record is optional here.
//! Raw structs stay private to the catalog module; the rest of the bot only
//! sees the normalized records.

use serde::Deserialize;
use std::time::Duration;

use crate::ui::format;

const SONG_PAGE: &str = "https://music.163.com/#/song?id=";
const PLAYLIST_PAGE: &str = "https://music.163.com/#/playlist?id=";
const USER_PAGE: &str = "https://music.163.com/#/user/home?id=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: u64,
    pub name: String,
    pub picture_url: Option<String>,
    /// Epoch milliseconds.
    pub publish_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTier {
    Free,
    VipOnly,
    Purchase,
    Unknown(i64),
}

impl From<i64> for FeeTier {
    fn from(code: i64) -> Self {
        match code {
            0 | 8 => FeeTier::Free,
            1 => FeeTier::VipOnly,
            4 => FeeTier::Purchase,
            other => FeeTier::Unknown(other),
        }
    }
}

impl FeeTier {
    pub fn label(&self) -> &'static str {
        match self {
            FeeTier::Free => "free",
            FeeTier::VipOnly => "vip only",
            FeeTier::Purchase => "purchase",
            FeeTier::Unknown(_) => "unknown",
        }
    }
}

/// One of the hi/mid/low quality buckets advertised for a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality {
    pub bitrate: u32,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qualities {
    pub high: Option<Quality>,
    pub medium: Option<Quality>,
    pub low: Option<Quality>,
}

impl Qualities {
    /// Highest advertised bitrate, if the provider sent any bucket.
    pub fn best_bitrate(&self) -> Option<u32> {
        [self.high, self.medium, self.low]
            .into_iter()
            .flatten()
            .map(|q| q.bitrate)
            .max()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: u64,
    pub title: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub duration_ms: u64,
    pub fee: FeeTier,
    pub qualities: Qualities,
}

impl Song {
    pub fn artist_names(&self) -> String {
        join_artists(&self.artists)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn length(&self) -> String {
        format::format_millis(self.duration_ms)
    }

    pub fn page_url(&self) -> String {
        format!("{SONG_PAGE}{}", self.id)
    }

    /// `"<artists> - <title>"` with characters that are unsafe in file
    /// names replaced.
    pub fn file_stem(&self) -> String {
        file_stem(&self.artists, &self.title)
    }
}

pub fn file_stem(artists: &[Artist], title: &str) -> String {
    sanitize_file_name(&format!("{} - {}", join_artists(artists), title))
}

pub fn join_artists(artists: &[Artist]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(" & ")
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub total: u64,
    pub songs: Vec<Song>,
}

/// Download descriptor returned by `song/url`.
#[derive(Debug, Clone, PartialEq)]
pub struct SongFile {
    pub id: u64,
    pub url: Option<String>,
    pub bitrate_kbps: u32,
    pub size: u64,
    pub container: String,
    pub level: Option<String>,
    pub fee: FeeTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: u64,
    pub name: String,
    pub creator: Option<String>,
    pub track_ids: Vec<u64>,
    pub track_count: u64,
    pub play_count: u64,
    pub cover_url: Option<String>,
    pub description: Option<String>,
}

impl Playlist {
    pub fn page_url(&self) -> String {
        format!("{PLAYLIST_PAGE}{}", self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricBlock {
    pub lyric: Option<String>,
    pub translation: Option<String>,
    pub contributor: Option<String>,
    pub translation_contributor: Option<String>,
    pub instrumental: bool,
}

impl LyricBlock {
    /// Lyric text with `[mm:ss.xx]` timing tags removed.
    pub fn plain_text(&self) -> Option<String> {
        let lyric = self.lyric.as_deref()?;
        let text = lyric
            .lines()
            .map(strip_time_tags)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        (!text.is_empty()).then_some(text)
    }
}

fn strip_time_tags(line: &str) -> &str {
    let mut rest = line.trim();
    while rest.starts_with('[') {
        match rest.find(']') {
            Some(end) => rest = rest[end + 1..].trim_start(),
            None => break,
        }
    }
    rest.trim_end()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub author_id: u64,
    pub content: String,
    pub liked_count: u64,
    /// Epoch milliseconds.
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    pub total: u64,
    pub hot: Vec<Comment>,
    pub recent: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: u64,
    pub nickname: String,
    pub signature: Option<String>,
    pub level: Option<u32>,
    pub listen_songs: Option<u64>,
    pub vip: bool,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
    pub follows: u64,
    pub followers: u64,
    /// Epoch milliseconds.
    pub created_at: Option<i64>,
    pub playlist_count: u64,
    pub subscribed_playlist_count: u64,
}

impl UserProfile {
    pub fn page_url(&self) -> String {
        format!("{USER_PAGE}{}", self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginStatus {
    pub logged_in: bool,
    pub profile: Option<UserProfile>,
}

// Provider JSON.

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub msg: Option<String>,
}

impl Envelope {
    pub fn is_ok(&self) -> bool {
        self.code.map_or(true, |c| c == 200)
    }

    pub fn reason(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .unwrap_or_else(|| format!("provider code {}", self.code.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<RawArtist> for Artist {
    fn from(raw: RawArtist) -> Self {
        Self {
            id: raw.id,
            name: raw.name.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAlbum {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pic_url: Option<String>,
    #[serde(default)]
    pub publish_time: Option<i64>,
}

impl From<RawAlbum> for Album {
    fn from(raw: RawAlbum) -> Self {
        Self {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            picture_url: raw.pic_url,
            publish_time: raw.publish_time.filter(|t| *t > 0),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct RawQuality {
    #[serde(default)]
    pub br: u32,
    #[serde(default)]
    pub size: u64,
}

impl From<RawQuality> for Quality {
    fn from(raw: RawQuality) -> Self {
        Self {
            bitrate: raw.br,
            size: raw.size,
        }
    }
}

/// Song as returned by both `search` (long field names) and `song/detail`
/// (short field names).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSong {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "ar")]
    pub artists: Vec<RawArtist>,
    #[serde(default, alias = "al")]
    pub album: Option<RawAlbum>,
    #[serde(default, alias = "dt")]
    pub duration: u64,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub publish_time: Option<i64>,
    #[serde(default)]
    pub h: Option<RawQuality>,
    #[serde(default)]
    pub m: Option<RawQuality>,
    #[serde(default)]
    pub l: Option<RawQuality>,
}

impl From<RawSong> for Song {
    fn from(raw: RawSong) -> Self {
        let mut album: Album = raw.album.unwrap_or_default().into();
        if album.publish_time.is_none() {
            album.publish_time = raw.publish_time.filter(|t| *t > 0);
        }

        Self {
            id: raw.id,
            title: raw.name.unwrap_or_default(),
            artists: raw.artists.into_iter().map(Artist::from).collect(),
            album,
            duration_ms: raw.duration,
            fee: raw.fee.into(),
            qualities: Qualities {
                high: raw.h.map(Quality::from),
                medium: raw.m.map(Quality::from),
                low: raw.l.map(Quality::from),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSearchResult {
    #[serde(default)]
    pub songs: Vec<RawSong>,
    #[serde(default)]
    pub song_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    pub result: Option<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSongDetailResponse {
    #[serde(default)]
    pub songs: Vec<RawSong>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSongFile {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub br: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub code: Option<i64>,
}

impl From<RawSongFile> for SongFile {
    fn from(raw: RawSongFile) -> Self {
        Self {
            id: raw.id,
            url: raw.url.filter(|u| !u.is_empty()),
            bitrate_kbps: raw.br / 1000,
            size: raw.size,
            container: raw
                .kind
                .map(|k| k.to_ascii_lowercase())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "mp3".to_string()),
            level: raw.level,
            fee: raw.fee.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSongFileResponse {
    #[serde(default)]
    pub data: Vec<RawSongFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrackId {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCreator {
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPlaylist {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creator: Option<RawCreator>,
    #[serde(default)]
    pub track_ids: Vec<RawTrackId>,
    #[serde(default)]
    pub tracks: Vec<RawSong>,
    #[serde(default)]
    pub track_count: u64,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub cover_img_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<RawPlaylist> for Playlist {
    fn from(raw: RawPlaylist) -> Self {
        // Older gateways only fill `tracks`; newer ones truncate `tracks`
        // but list every id in `trackIds`.
        let track_ids: Vec<u64> = if raw.track_ids.is_empty() {
            raw.tracks.iter().map(|t| t.id).collect()
        } else {
            raw.track_ids.iter().map(|t| t.id).collect()
        };

        Self {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            creator: raw.creator.and_then(|c| c.nickname),
            track_count: raw.track_count.max(track_ids.len() as u64),
            track_ids,
            play_count: raw.play_count,
            cover_url: raw.cover_img_url,
            description: raw.description.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPlaylistResponse {
    #[serde(default)]
    pub playlist: Option<RawPlaylist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLyricText {
    #[serde(default)]
    pub lyric: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLyricUser {
    #[serde(default, alias = "name")]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLyricResponse {
    #[serde(default)]
    pub lrc: Option<RawLyricText>,
    #[serde(default)]
    pub tlyric: Option<RawLyricText>,
    #[serde(default)]
    pub lyric_user: Option<RawLyricUser>,
    #[serde(default)]
    pub trans_user: Option<RawLyricUser>,
    #[serde(default)]
    pub nolyric: bool,
}

impl From<RawLyricResponse> for LyricBlock {
    fn from(raw: RawLyricResponse) -> Self {
        let non_empty = |text: Option<RawLyricText>| {
            text.and_then(|t| t.lyric).filter(|l| !l.trim().is_empty())
        };

        Self {
            lyric: non_empty(raw.lrc),
            translation: non_empty(raw.tlyric),
            contributor: raw.lyric_user.and_then(|u| u.nickname),
            translation_contributor: raw.trans_user.and_then(|u| u.nickname),
            instrumental: raw.nolyric,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCommentUser {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawComment {
    #[serde(default)]
    pub comment_id: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub liked_count: u64,
    #[serde(default)]
    pub user: Option<RawCommentUser>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        let (author_id, author) = match raw.user {
            Some(user) => (user.user_id, user.nickname.unwrap_or_default()),
            None => (0, String::new()),
        };

        Self {
            id: raw.comment_id,
            author,
            author_id,
            content: raw.content.unwrap_or_default(),
            liked_count: raw.liked_count,
            time: raw.time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCommentResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub hot_comments: Vec<RawComment>,
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

impl From<RawCommentResponse> for CommentPage {
    fn from(raw: RawCommentResponse) -> Self {
        Self {
            total: raw.total,
            hot: raw.hot_comments.into_iter().map(Comment::from).collect(),
            recent: raw.comments.into_iter().map(Comment::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawProfile {
    pub user_id: u64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub background_url: Option<String>,
    #[serde(default)]
    pub vip_type: i64,
    #[serde(default)]
    pub follows: u64,
    #[serde(default)]
    pub followeds: u64,
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub playlist_count: u64,
    #[serde(default)]
    pub playlist_be_subscribed_count: u64,
}

impl From<RawProfile> for UserProfile {
    fn from(raw: RawProfile) -> Self {
        Self {
            user_id: raw.user_id,
            nickname: raw.nickname.unwrap_or_default(),
            signature: raw.signature.filter(|s| !s.trim().is_empty()),
            level: None,
            listen_songs: None,
            vip: raw.vip_type > 0,
            avatar_url: raw.avatar_url,
            background_url: raw.background_url,
            follows: raw.follows,
            followers: raw.followeds,
            created_at: raw.create_time.filter(|t| *t > 0),
            playlist_count: raw.playlist_count,
            subscribed_playlist_count: raw.playlist_be_subscribed_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUserDetailResponse {
    #[serde(default)]
    pub profile: Option<RawProfile>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub listen_songs: Option<u64>,
}

impl RawUserDetailResponse {
    pub fn into_profile(self) -> Option<UserProfile> {
        let mut profile: UserProfile = self.profile?.into();
        profile.level = self.level;
        profile.listen_songs = self.listen_songs;
        Some(profile)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLoginData {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub profile: Option<RawProfile>,
}

/// `login/status` answers either `{code, profile}` or `{data: {code, profile}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawLoginStatusResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub profile: Option<RawProfile>,
    #[serde(default)]
    pub data: Option<RawLoginData>,
}

impl From<RawLoginStatusResponse> for LoginStatus {
    fn from(raw: RawLoginStatusResponse) -> Self {
        let (code, profile) = match raw.data {
            Some(data) => (data.code.or(raw.code), data.profile.or(raw.profile)),
            None => (raw.code, raw.profile),
        };

        let profile = profile.map(UserProfile::from);
        Self {
            logged_in: code.map_or(true, |c| c == 200) && profile.is_some(),
            profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_song_maps_long_field_names() {
        let raw: RawSong = serde_json::from_str(
            r#"{"id": 1, "name": "晴天", "artists": [{"id": 6452, "name": "周杰伦"}],
                "album": {"id": 18905, "name": "叶惠美", "publishTime": 1059580800000},
                "duration": 269000, "fee": 1}"#,
        )
        .unwrap();
        let song = Song::from(raw);

        assert_eq!(song.title, "晴天");
        assert_eq!(song.artist_names(), "周杰伦");
        assert_eq!(song.album.publish_time, Some(1_059_580_800_000));
        assert_eq!(song.length(), "04:29");
        assert_eq!(song.fee, FeeTier::VipOnly);
        assert_eq!(song.qualities, Qualities::default());
        assert_eq!(song.page_url(), "https://music.163.com/#/song?id=1");
    }

    #[test]
    fn test_detail_song_maps_short_field_names() {
        let raw: RawSong = serde_json::from_str(
            r#"{"id": 2, "name": "Song", "ar": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}],
                "al": {"id": 3, "name": "Album", "picUrl": "https://p1.music.126.net/x.jpg"},
                "dt": 185000, "fee": 8, "h": {"br": 320000, "size": 7400000},
                "m": null, "l": {"br": 128000, "size": 2900000}, "publishTime": 1500000000000}"#,
        )
        .unwrap();
        let song = Song::from(raw);

        assert_eq!(song.artist_names(), "A & B");
        assert_eq!(song.length(), "03:05");
        assert_eq!(song.album.picture_url.as_deref(), Some("https://p1.music.126.net/x.jpg"));
        assert_eq!(song.album.publish_time, Some(1_500_000_000_000));
        assert_eq!(song.qualities.medium, None);
        assert_eq!(song.qualities.best_bitrate(), Some(320_000));
        assert_eq!(song.fee, FeeTier::Free);
    }

    #[test]
    fn test_file_stem_replaces_separators() {
        let song = Song {
            id: 1,
            title: "AC/DC: Live?".to_string(),
            artists: vec![Artist { id: 1, name: "Band".to_string() }],
            album: Album { id: 0, name: String::new(), picture_url: None, publish_time: None },
            duration_ms: 0,
            fee: FeeTier::Free,
            qualities: Qualities::default(),
        };
        assert_eq!(song.file_stem(), "Band - AC_DC_ Live_");
    }

    #[test]
    fn test_song_file_defaults_container() {
        let raw: RawSongFile =
            serde_json::from_str(r#"{"id": 5, "url": "", "br": 320000, "size": 10, "type": null, "fee": 0, "code": 404}"#)
                .unwrap();
        let file = SongFile::from(raw);
        assert_eq!(file.url, None);
        assert_eq!(file.container, "mp3");
        assert_eq!(file.bitrate_kbps, 320);
    }

    #[test]
    fn test_playlist_prefers_track_ids() {
        let raw: RawPlaylist = serde_json::from_str(
            r#"{"id": 9, "name": "Mix", "creator": {"nickname": "dj"},
                "trackIds": [{"id": 1}, {"id": 2}, {"id": 3}], "tracks": [{"id": 1}],
                "trackCount": 3, "playCount": 42, "description": "  "}"#,
        )
        .unwrap();
        let playlist = Playlist::from(raw);
        assert_eq!(playlist.track_ids, vec![1, 2, 3]);
        assert_eq!(playlist.creator.as_deref(), Some("dj"));
        assert_eq!(playlist.description, None);
    }

    #[test]
    fn test_playlist_falls_back_to_tracks() {
        let raw: RawPlaylist =
            serde_json::from_str(r#"{"id": 9, "tracks": [{"id": 7}, {"id": 8}]}"#).unwrap();
        let playlist = Playlist::from(raw);
        assert_eq!(playlist.track_ids, vec![7, 8]);
        assert_eq!(playlist.track_count, 2);
    }

    #[test]
    fn test_lyric_without_translation() {
        let raw: RawLyricResponse = serde_json::from_str(
            r#"{"lrc": {"lyric": "[00:01.00]first\n[00:02.50][00:10.00]second\n"},
                "tlyric": {"lyric": ""}, "lyricUser": {"nickname": "someone"}, "code": 200}"#,
        )
        .unwrap();
        let lyric = LyricBlock::from(raw);
        assert_eq!(lyric.translation, None);
        assert_eq!(lyric.contributor.as_deref(), Some("someone"));
        assert_eq!(lyric.plain_text().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_instrumental_lyric() {
        let raw: RawLyricResponse = serde_json::from_str(r#"{"nolyric": true, "code": 200}"#).unwrap();
        let lyric = LyricBlock::from(raw);
        assert!(lyric.instrumental);
        assert_eq!(lyric.plain_text(), None);
    }

    #[test]
    fn test_login_status_both_shapes() {
        let legacy: RawLoginStatusResponse =
            serde_json::from_str(r#"{"code": 200, "profile": {"userId": 1, "nickname": "me"}}"#).unwrap();
        let wrapped: RawLoginStatusResponse = serde_json::from_str(
            r#"{"data": {"code": 200, "profile": {"userId": 1, "nickname": "me"}}}"#,
        )
        .unwrap();
        let anonymous: RawLoginStatusResponse =
            serde_json::from_str(r#"{"data": {"code": 200, "profile": null}}"#).unwrap();

        assert!(LoginStatus::from(legacy).logged_in);
        assert!(LoginStatus::from(wrapped).logged_in);
        assert!(!LoginStatus::from(anonymous).logged_in);
    }

    #[test]
    fn test_user_detail_merges_top_level_fields() {
        let raw: RawUserDetailResponse = serde_json::from_str(
            r#"{"level": 9, "listenSongs": 1200, "profile": {"userId": 3, "nickname": "u",
                "vipType": 11, "followeds": 5, "follows": 2, "createTime": 1400000000000}}"#,
        )
        .unwrap();
        let profile = raw.into_profile().unwrap();
        assert_eq!(profile.level, Some(9));
        assert_eq!(profile.listen_songs, Some(1200));
        assert!(profile.vip);
        assert_eq!(profile.followers, 5);
        assert_eq!(profile.follows, 2);
    }
}
