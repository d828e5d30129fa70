use futures::{Stream, StreamExt};
use serenity::{
    builder::CreateMessage,
    collector::MessageCollector,
    model::{channel::Message, id::ChannelId},
    prelude::Context,
};
use std::{pin::pin, time::Duration};
use tracing::{debug, info};

use crate::{catalog::Song, error::CommandError, ui::embeds};

/// Largest result count a `-N` suffix may ask for.
pub const MAX_RESULTS: usize = 49;

/// Splits a trailing `-N` result count off a search phrase
/// (`"晴天 -5"` -> `("晴天", Some(5))`). Counts outside `1..=49` are left
/// in the phrase.
pub fn split_result_count(input: &str) -> (&str, Option<usize>) {
    let input = input.trim();
    let Some((phrase, suffix)) = input.rsplit_once('-') else {
        return (input, None);
    };

    let phrase = phrase.trim_end();
    match suffix.parse::<usize>() {
        Ok(count) if (1..=MAX_RESULTS).contains(&count) && !phrase.is_empty() => (phrase, Some(count)),
        _ => (input, None),
    }
}

/// Parses a selection reply, accepting only numbers in `1..=count`.
pub fn parse_selection(content: &str, count: usize) -> Option<usize> {
    content
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|choice| (1..=count).contains(choice))
}

/// Waits for the first reply naming one of `count` candidates and returns
/// its 0-based index. A single candidate is selected without waiting;
/// replies that are not a valid number are ignored.
pub async fn await_selection<S>(count: usize, replies: S, timeout: Duration) -> Result<usize, CommandError>
where
    S: Stream<Item = String>,
{
    match count {
        0 => return Err(CommandError::NoCandidates(String::new())),
        1 => return Ok(0),
        _ => {}
    }

    let wait = async {
        let mut replies = pin!(replies);
        while let Some(content) = replies.next().await {
            match parse_selection(&content, count) {
                Some(choice) => return Some(choice - 1),
                None => debug!("Ignoring reply `{}` to selection prompt", content),
            }
        }
        None
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(Some(index)) => Ok(index),
        // The reply stream only ends when the collector is dropped.
        Ok(None) | Err(_) => Err(CommandError::SelectionTimeout),
    }
}

/// Shows `songs` as a numbered list in the channel and waits for the author
/// of `msg` to pick one.
pub async fn prompt_selection(
    ctx: &Context,
    msg: &Message,
    keyword: &str,
    songs: &[Song],
    total: u64,
    timeout: Duration,
) -> Result<usize, anyhow::Error> {
    send_embed(ctx, msg.channel_id, embeds::search_results(keyword, songs, total)).await?;

    if songs.len() > 1 {
        info!("⏳ Waiting for {} to pick one of {} results", msg.author.name, songs.len());
    }

    let replies = MessageCollector::new(&ctx.shard)
        .author_id(msg.author.id)
        .channel_id(msg.channel_id)
        .timeout(timeout)
        .stream()
        .map(|reply| reply.content);

    Ok(await_selection(songs.len(), replies, timeout).await?)
}

async fn send_embed(ctx: &Context, channel: ChannelId, embed: serenity::builder::CreateEmbed) -> serenity::Result<Message> {
    channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await
}
