use serenity::model::id::ChannelId;
use thiserror::Error;

/// Failures talking to the music catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Bad identifier, refused resource or an empty result set.
    #[error("catalog lookup failed: {0}")]
    Lookup(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog responded with HTTP {0}")]
    Status(u16),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not persist audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{0}` is neither a track id nor a catalog link")]
    InvalidReference(String),
}

/// Voice session and queue state errors. None of these poison the session.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("the queue is empty")]
    EmptyQueue,

    #[error("nothing is playing right now")]
    NotPlaying,

    #[error("already connected to <#{0}>")]
    AlreadyConnected(ChannelId),

    #[error("not connected to any voice channel")]
    NotConnected,

    #[error("this voice session has been closed")]
    SessionClosed,

    #[error("position {index} is out of range (queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("could not connect to voice: {0}")]
    Connect(String),

    #[error("audio output error: {0}")]
    Output(String),

    #[error(transparent)]
    Source(#[from] CatalogError),
}

/// Errors raised by the command layer itself.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Timeout! You took too long to decide..")]
    SelectionTimeout,

    #[error("no results for `{0}`")]
    NoCandidates(String),

    #[error("this command can't be used in DM channels")]
    NotInGuild,

    #[error("you are not connected to any voice channel")]
    NotInVoice,

    #[error("only the bot owner can do that")]
    OwnerOnly,

    #[error("unknown command group `{0}`")]
    UnknownGroup(String),

    #[error("{0}")]
    BadArgument(String),
}
