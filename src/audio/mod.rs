//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`session`] - Voice Session
//! One [`session::VoiceSession`] per guild owns the voice connection, the
//! pending queue and the current track. It moves through
//! `Disconnected -> Idle -> Playing <-> Paused` and starts the next track
//! whenever the current one ends.
//!
//! ### [`registry`] - Session Registry
//! Maps guilds to sessions; concurrent first commands in a guild share a
//! single session.
//!
//! ### [`queue`] - Playback Queue
//! FIFO of pending [`track::Track`]s with paging and shuffle.
//!
//! ### [`output`] / [`voice`] - Outputs
//! The traits a session talks through, and their songbird implementation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crate::audio::{registry::SessionRegistry, session::JoinIntent, track::Track};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(registry: &SessionRegistry, track: Track) -> anyhow::Result<()> {
//! let session = registry.get_or_create(GuildId::new(123456789));
//! session.join(ChannelId::new(987654321), JoinIntent::Stay).await?;
//!
//! let position = session.enqueue(track).await?;
//! session.pause().await?;
//! session.resume().await?;
//! session.skip().await?;
//! # Ok(())
//! # }
//! ```

pub mod output;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;
pub mod voice;
