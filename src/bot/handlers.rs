use anyhow::Result;
use serenity::{
    builder::{CreateMessage, EditMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::{sync::Arc, time::Instant};
use tracing::{info, warn};

use crate::{
    audio::{
        registry::SessionRegistry,
        session::{JoinIntent, JoinOutcome, VoiceSession},
        track::{Track, TrackSource},
    },
    bot::{
        commands::{Command, CommandSpec, Group},
        search, MusicBot, ShardManagerContainer,
    },
    catalog::Song,
    error::{CommandError, PlayerError},
    ui::embeds,
};

/// Tracks shown per `queue` page.
const QUEUE_PAGE_SIZE: usize = 10;
/// Ids fetched per `song/detail` request while loading a playlist.
const PLAYLIST_BATCH: usize = 50;
/// Enqueued tracks between two edits of the playlist progress message.
const PROGRESS_EVERY: usize = 10;
const HOT_COMMENTS: usize = 5;

/// Runs one resolved command invocation.
pub async fn run(ctx: &Context, msg: &Message, bot: &MusicBot, spec: &'static CommandSpec, args: &str) -> Result<()> {
    if spec.owner_only && !bot.is_owner(msg.author.id) {
        return Err(CommandError::OwnerOnly.into());
    }

    info!(
        "📝 Command {}{} used by {} in {}",
        bot.config.prefix, spec.name, msg.author.name, msg.channel_id
    );

    match spec.command {
        Command::Greet => {
            say(ctx, msg, format!("Hello {}!", msg.author.name)).await?;
        }
        Command::Ping => handle_ping(ctx, msg).await?,
        Command::Help => {
            let sections = help_sections(&bot.groups.visible());
            let embed = embeds::help(&bot.config.prefix, &sections);
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
        Command::Logout => handle_logout(ctx, msg, bot).await?,
        Command::Load => {
            let group = Group::parse(args)?;
            bot.groups.load(group)?;
            say(ctx, msg, format!("`{}` commands has been loaded.", group.name())).await?;
        }
        Command::Unload => {
            let group = Group::parse(args)?;
            bot.groups.unload(group)?;
            say(ctx, msg, format!("`{}` commands has been unloaded.", group.name())).await?;
        }
        Command::Reload => {
            let group = Group::parse(args)?;
            bot.groups.reload(group);
            say(ctx, msg, format!("`{}` commands has been reloaded.", group.name())).await?;
        }
        Command::Account => {
            let status = bot.catalog.login_status().await?;
            send_embed(ctx, msg.channel_id, embeds::account(&status)).await?;
        }
        Command::User => {
            let uid = args
                .parse::<u64>()
                .map_err(|_| CommandError::BadArgument(format!("Usage: `{}{}`", bot.config.prefix, spec.usage)))?;
            let user = bot.catalog.user(uid).await?;
            send_embed(ctx, msg.channel_id, embeds::profile(&user)).await?;
        }
        _ => {
            let guild = msg.guild_id.ok_or(CommandError::NotInGuild)?;
            run_player(ctx, msg, bot, spec, guild, args).await?;
        }
    }

    Ok(())
}

async fn run_player(
    ctx: &Context,
    msg: &Message,
    bot: &MusicBot,
    spec: &'static CommandSpec,
    guild: GuildId,
    args: &str,
) -> Result<()> {
    match spec.command {
        Command::Join => handle_join(ctx, msg, bot, guild, JoinIntent::Stay).await,
        Command::Move => handle_join(ctx, msg, bot, guild, JoinIntent::Move).await,
        Command::Leave => match bot.registry.leave(guild).await {
            Ok(()) => {
                say(ctx, msg, "👋 Disconnected.").await?;
                Ok(())
            }
            Err(PlayerError::NotConnected) => {
                say(ctx, msg, "Not connected to any voice channel.").await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Command::Search => handle_search(ctx, msg, bot, spec, args).await,
        Command::Play => handle_play(ctx, msg, bot, spec, guild, args).await,
        Command::Playlist => handle_playlist(ctx, msg, bot, spec, guild, args).await,
        Command::Queue => handle_queue(ctx, msg, bot, guild, args).await,
        Command::NowPlaying => {
            match current_track(bot, guild).await {
                Some(track) => send_embed(ctx, msg.channel_id, embeds::now_playing(&track)).await?,
                None => say(ctx, msg, "There is nothing playing!").await?,
            };
            Ok(())
        }
        Command::Skip => {
            let skipped = session_of(bot, guild)?.skip().await?;
            info!("⏭️ {} skipped {}", msg.author.name, skipped.title);
            say(ctx, msg, "Skipped!").await?;
            Ok(())
        }
        Command::Pause => {
            session_of(bot, guild)?.pause().await?;
            msg.react(&ctx.http, '⏸').await?;
            Ok(())
        }
        Command::Resume => {
            session_of(bot, guild)?.resume().await?;
            msg.react(&ctx.http, '▶').await?;
            Ok(())
        }
        Command::Stop => {
            let cleared = session_of(bot, guild)?.stop().await?;
            info!("⏹️ {} stopped playback in guild {} ({} cleared)", msg.author.name, guild, cleared);
            msg.react(&ctx.http, '⏹').await?;
            Ok(())
        }
        Command::Shuffle => {
            let count = session_of(bot, guild)?.shuffle().await?;
            say(ctx, msg, format!("🔀 Shuffled {count} songs.")).await?;
            Ok(())
        }
        Command::Remove => {
            let position = parse_position(args)
                .ok_or_else(|| CommandError::BadArgument(format!("Usage: `{}{}`", bot.config.prefix, spec.usage)))?;
            let removed = session_of(bot, guild)?.remove(position - 1).await?;
            say(
                ctx,
                msg,
                format!("Removed `{} - {}` from the queue.", removed.artist_names(), removed.title),
            )
            .await?;
            Ok(())
        }
        Command::Lyric => {
            let Some(track) = current_track(bot, guild).await else {
                say(ctx, msg, "There is nothing playing!").await?;
                return Ok(());
            };
            let lyric = bot.catalog.lyric(track.id).await?;
            send_embed(ctx, msg.channel_id, embeds::lyric(&track, &lyric)).await?;
            Ok(())
        }
        Command::Comments => handle_comments(ctx, msg, bot, guild, args).await,
        _ => {
            warn!("⚠️ {} has no player handler", spec.name);
            Ok(())
        }
    }
}

async fn handle_ping(ctx: &Context, msg: &Message) -> Result<()> {
    let started = Instant::now();
    let mut reply = msg.channel_id.say(&ctx.http, "🏓 Pinging...").await?;
    let latency = started.elapsed().as_secs_f64() * 1000.0;

    reply
        .edit(ctx, EditMessage::new().content(format!("🏓 {latency:.1} ms")))
        .await?;
    Ok(())
}

async fn handle_logout(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    say(ctx, msg, "Goodbye! Logging out...").await?;
    info!("👋 Logout requested by {}", msg.author.name);

    bot.registry.shutdown_all().await;

    let shard_manager = ctx.data.read().await.get::<ShardManagerContainer>().cloned();
    match shard_manager {
        Some(manager) => manager.shutdown_all().await,
        None => warn!("⚠️ Shard manager is not registered, cannot shut down"),
    }
    Ok(())
}

async fn handle_join(ctx: &Context, msg: &Message, bot: &MusicBot, guild: GuildId, intent: JoinIntent) -> Result<()> {
    let channel = author_voice_channel(ctx, guild, msg.author.id)?;
    let session = bot.registry.get_or_create(guild);

    let text = match session.join(channel, intent).await? {
        JoinOutcome::Joined => format!("🔊 Joined <#{channel}>"),
        JoinOutcome::Moved => format!("🔊 Moved to <#{channel}>"),
        JoinOutcome::AlreadyHere => format!("Already in <#{channel}>"),
    };
    say(ctx, msg, text).await?;
    Ok(())
}

async fn handle_search(ctx: &Context, msg: &Message, bot: &MusicBot, spec: &CommandSpec, args: &str) -> Result<()> {
    let (phrase, count) = search::split_result_count(args);
    if phrase.is_empty() {
        return Err(CommandError::BadArgument(format!("Usage: `{}{}`", bot.config.prefix, spec.usage)).into());
    }

    let page = bot
        .catalog
        .search(phrase, count.unwrap_or(bot.config.search_limit), 0)
        .await?;
    let index = search::prompt_selection(ctx, msg, phrase, &page.songs, page.total, bot.config.selection_timeout).await?;
    let song = &page.songs[index];

    say(
        ctx,
        msg,
        format!(
            "ID for `{} - {}` is `{}`\n{}",
            song.artist_names(),
            song.title,
            song.id,
            song.page_url()
        ),
    )
    .await?;
    Ok(())
}

async fn handle_play(
    ctx: &Context,
    msg: &Message,
    bot: &MusicBot,
    spec: &CommandSpec,
    guild: GuildId,
    args: &str,
) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::BadArgument(format!("Usage: `{}{}`", bot.config.prefix, spec.usage)).into());
    }

    let session = ensure_voice(ctx, msg, bot, guild).await?;
    let candidates = bot.catalog.lookup(args, bot.config.search_limit).await?;
    let index = match candidates.len() {
        0 => return Err(CommandError::NoCandidates(args.to_string()).into()),
        1 => 0,
        n => search::prompt_selection(ctx, msg, args, &candidates, n as u64, bot.config.selection_timeout).await?,
    };
    let song = &candidates[index];

    let _ = msg.channel_id.broadcast_typing(&ctx.http).await;
    let bitrate = song
        .qualities
        .best_bitrate()
        .map_or(bot.catalog.bitrate(), |best| best.min(bot.catalog.bitrate()));
    let source = bot
        .catalog
        .resolve_audio_source(song.id, &song.file_stem(), bitrate, bot.catalog.downloads_enabled())
        .await?;

    let track = Track::new(song, source.into(), msg.author.id, msg.channel_id);
    let position = session.enqueue(track).await?;

    let text = if position == 0 {
        format!("Enqueued `{} - {}`", song.artist_names(), song.title)
    } else {
        format!(
            "Enqueued `{} - {}` at position {}",
            song.artist_names(),
            song.title,
            position
        )
    };
    say(ctx, msg, text).await?;
    Ok(())
}

async fn handle_playlist(
    ctx: &Context,
    msg: &Message,
    bot: &MusicBot,
    spec: &CommandSpec,
    guild: GuildId,
    args: &str,
) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::BadArgument(format!("Usage: `{}{}`", bot.config.prefix, spec.usage)).into());
    }

    let session = ensure_voice(ctx, msg, bot, guild).await?;
    let playlist = bot.catalog.playlist(args).await?;
    let total = playlist.track_ids.len();
    info!("📋 Enqueuing playlist {} ({} tracks) for {}", playlist.name, total, msg.author.name);

    let mut progress = msg
        .channel_id
        .say(&ctx.http, format!("Enqueuing playlist `{}`...", playlist.name))
        .await?;

    let mut enqueued = 0;
    let mut failed = 0;
    for chunk in playlist.track_ids.chunks(PLAYLIST_BATCH) {
        let songs = match bot.catalog.songs(chunk).await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("❌ Loading {} playlist tracks failed: {}", chunk.len(), e);
                failed += chunk.len();
                continue;
            }
        };
        failed += missing_ids(chunk, &songs);

        for song in &songs {
            let track = Track::new(song, TrackSource::Deferred, msg.author.id, msg.channel_id);
            session.enqueue(track).await?;
            enqueued += 1;

            if enqueued % PROGRESS_EVERY == 0 {
                let update = EditMessage::new().content(format!(
                    "Enqueuing playlist `{}`... {}/{}",
                    playlist.name, enqueued, total
                ));
                if let Err(e) = progress.edit(ctx, update).await {
                    warn!("⚠️ Could not update playlist progress: {:?}", e);
                }
            }
        }
    }

    progress
        .edit(
            ctx,
            EditMessage::new()
                .content("All songs has been added to the player queue!")
                .embed(embeds::playlist_summary(&playlist, enqueued, failed)),
        )
        .await?;
    msg.react(&ctx.http, '👍').await?;
    Ok(())
}

async fn handle_queue(ctx: &Context, msg: &Message, bot: &MusicBot, guild: GuildId, args: &str) -> Result<()> {
    let page = if args.is_empty() {
        1
    } else {
        parse_position(args).ok_or_else(|| CommandError::BadArgument(format!("`{args}` is not a page number")))?
    };

    let Some(session) = bot.registry.get(guild) else {
        say(ctx, msg, "Empty queue.").await?;
        return Ok(());
    };

    let current = session.now_playing().await;
    let queue = session.queue_page(page, QUEUE_PAGE_SIZE).await;
    if queue.total_items == 0 && current.is_none() {
        say(ctx, msg, "Empty queue.").await?;
        return Ok(());
    }

    send_embed(ctx, msg.channel_id, embeds::queue(&queue, current.as_ref())).await?;
    Ok(())
}

async fn handle_comments(ctx: &Context, msg: &Message, bot: &MusicBot, guild: GuildId, args: &str) -> Result<()> {
    let (id, title) = if args.is_empty() {
        let Some(track) = current_track(bot, guild).await else {
            say(ctx, msg, "There is nothing playing!").await?;
            return Ok(());
        };
        (track.id, track.title)
    } else {
        let song = bot.catalog.song_by_reference(args).await?;
        (song.id, song.title)
    };

    let page = bot.catalog.comments(id, HOT_COMMENTS).await?;
    send_embed(ctx, msg.channel_id, embeds::comments(&title, &page)).await?;
    Ok(())
}

async fn ensure_voice(ctx: &Context, msg: &Message, bot: &MusicBot, guild: GuildId) -> Result<Arc<VoiceSession>> {
    join_author_channel(&bot.registry, guild, author_voice_channel(ctx, guild, msg.author.id)).await
}

/// The guild's session, connected to the author's channel. The author must
/// be in voice, and in the bot's channel once the bot is connected.
async fn join_author_channel(
    registry: &SessionRegistry,
    guild: GuildId,
    author_channel: Result<ChannelId, CommandError>,
) -> Result<Arc<VoiceSession>> {
    let channel = author_channel?;
    let session = registry.get_or_create(guild);
    session.join(channel, JoinIntent::Stay).await?;
    Ok(session)
}

fn session_of(bot: &MusicBot, guild: GuildId) -> Result<Arc<VoiceSession>, PlayerError> {
    bot.registry.get(guild).ok_or(PlayerError::NotConnected)
}

async fn current_track(bot: &MusicBot, guild: GuildId) -> Option<Track> {
    bot.registry.get(guild)?.now_playing().await
}

fn author_voice_channel(ctx: &Context, guild: GuildId, user: UserId) -> Result<ChannelId, CommandError> {
    let guild = guild.to_guild_cached(&ctx.cache).ok_or(CommandError::NotInGuild)?;
    guild
        .voice_states
        .get(&user)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(CommandError::NotInVoice)
}

/// Requested ids the provider returned no record for.
fn missing_ids(requested: &[u64], songs: &[Song]) -> usize {
    requested
        .iter()
        .filter(|id| !songs.iter().any(|song| song.id == **id))
        .count()
}

/// Parses a 1-based position or page number.
fn parse_position(args: &str) -> Option<usize> {
    args.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

/// Groups `commands` by command group for the help embed, skipping empty
/// groups.
fn help_sections(commands: &[&'static CommandSpec]) -> Vec<(&'static str, Vec<(&'static str, &'static str)>)> {
    Group::ALL
        .into_iter()
        .filter_map(|group| {
            let entries: Vec<_> = commands
                .iter()
                .filter(|spec| spec.group == group)
                .map(|spec| (spec.usage, spec.description))
                .collect();
            (!entries.is_empty()).then_some((group.name(), entries))
        })
        .collect()
}

async fn say(ctx: &Context, msg: &Message, text: impl Into<String>) -> serenity::Result<Message> {
    msg.channel_id.say(&ctx.http, text).await
}

async fn send_embed(ctx: &Context, channel: ChannelId, embed: serenity::builder::CreateEmbed) -> serenity::Result<Message> {
    channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await
}
