use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{queue::QueuePage, track::Track},
    catalog::{CommentPage, LoginStatus, LyricBlock, Playlist, Song, UserProfile},
    ui::format::{format_date, format_duration, format_timestamp, truncate},
};

/// Bot color palette.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const BLURPLE: Colour = Colour::from_rgb(88, 101, 242);
    pub const LYRIC_ORANGE: Colour = Colour::from_rgb(230, 126, 34);
    pub const NETEASE_RED: Colour = Colour::from_rgb(194, 12, 12);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 NetEase Music Bot";
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_LIMIT: usize = 1024;
const RESULTS_PER_FIELD: usize = 10;
const RESULT_LINE_LIMIT: usize = 100;

pub fn now_playing(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now playing")
        .description(format!("```css\n{} - {}\n```", track.title, track.artist_names()))
        .color(colors::BLURPLE)
        .field("Album", non_empty(&track.album.name), true)
        .field("Duration", track.length(), true)
        .field("Requested by", format!("<@{}>", track.requester), true)
        .field("Music Page", format!("[Click]({})", track.page_url()), true)
        .field("ID", track.id.to_string(), true);

    if let Some(picture) = &track.album.picture_url {
        embed = embed.thumbnail(picture);
    }

    let release = track
        .album
        .publish_time
        .map_or_else(|| "unknown".to_string(), format_date);
    embed.footer(CreateEmbedFooter::new(format!("Release on {release}")))
}

/// Numbered candidate list for the selection prompt.
pub fn search_results(keyword: &str, songs: &[Song], total: u64) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("🔍 Search results of \"{}\":", truncate(keyword, 200)))
        .description(format!("Please select a track from # 1-{}:", songs.len()))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!(
            "Current displays: {}/{}",
            songs.len(),
            total
        )));

    // Discord caps an embed at 25 fields, so candidates are listed as lines
    // grouped into fields of ten.
    for (chunk_index, chunk) in songs.chunks(RESULTS_PER_FIELD).enumerate() {
        let first = chunk_index * RESULTS_PER_FIELD + 1;
        let lines = chunk
            .iter()
            .enumerate()
            .map(|(i, song)| {
                truncate(
                    &format!(
                        "`{}.` **{}** {} ~ {} • {}",
                        first + i,
                        song.title,
                        song.artist_names(),
                        non_empty(&song.album.name),
                        song.length()
                    ),
                    RESULT_LINE_LIMIT,
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field(
            format!("# {}-{}", first, first + chunk.len() - 1),
            truncate(&lines, FIELD_LIMIT),
            false,
        );
    }

    embed
}

pub fn queue(page: &QueuePage, current: Option<&Track>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now());

    if let Some(current) = current {
        embed = embed.field(
            "▶️ Playing",
            format!("**{}** - {}", current.title, current.artist_names()),
            false,
        );
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **The queue is empty**")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let mut lines = String::new();
    for (i, track) in page.items.iter().enumerate() {
        lines.push_str(&format!(
            "`{}.` {} - [{}]({}) • {}\n",
            page.offset + i + 1,
            track.artist_names(),
            track.title,
            track.page_url(),
            track.length()
        ));
    }

    embed
        .description(truncate(
            &format!("**{} tracks** • {}\n\n{}", page.total_items, format_duration(page.total_duration), lines),
            DESCRIPTION_LIMIT,
        ))
        .footer(CreateEmbedFooter::new(format!(
            "Viewing page {}/{}",
            page.current_page, page.total_pages
        )))
}

pub fn lyric(track: &Track, lyric: &LyricBlock) -> CreateEmbed {
    let text = if lyric.instrumental {
        "🎼 Instrumental".to_string()
    } else {
        lyric
            .plain_text()
            .unwrap_or_else(|| "Lyric is unavailable.".to_string())
    };

    let mut embed = CreateEmbed::default()
        .title(truncate(&format!("{} by {}", track.title, track.artist_names()), 256))
        .description(truncate(&text, DESCRIPTION_LIMIT))
        .color(colors::LYRIC_ORANGE);

    if let Some(translation) = &lyric.translation {
        let translated = LyricBlock {
            lyric: Some(translation.clone()),
            ..Default::default()
        };
        if let Some(text) = translated.plain_text() {
            embed = embed.field("Translation", truncate(&text, FIELD_LIMIT), false);
        }
    }

    let mut footer = format!(
        "Contributed by {}",
        lyric.contributor.as_deref().unwrap_or("N/A")
    );
    if let Some(translator) = &lyric.translation_contributor {
        footer.push_str(&format!(" • Translated by {translator}"));
    }
    embed.footer(CreateEmbedFooter::new(footer))
}

pub fn comments(title: &str, page: &CommentPage) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(truncate(&format!("💬 Comments on {title}"), 256))
        .color(colors::NETEASE_RED)
        .footer(CreateEmbedFooter::new(format!("{} comments in total", page.total)));

    let shown = if page.hot.is_empty() { &page.recent } else { &page.hot };
    if shown.is_empty() {
        return embed.description("No comments yet.");
    }

    for comment in shown.iter().take(10) {
        embed = embed.field(
            truncate(&format!("{} • 👍 {}", comment.author, comment.liked_count), 256),
            truncate(
                &format!("{}\n*{}*", comment.content, format_timestamp(comment.time)),
                FIELD_LIMIT,
            ),
            false,
        );
    }
    embed
}

pub fn profile(user: &UserProfile) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("👤 {}", user.nickname))
        .url(user.page_url())
        .color(colors::NETEASE_RED)
        .field("Level", user.level.map_or("?".to_string(), |l| l.to_string()), true)
        .field("VIP", if user.vip { "Yes" } else { "No" }, true)
        .field(
            "Songs listened",
            user.listen_songs.map_or("?".to_string(), |n| n.to_string()),
            true,
        )
        .field("Follows", user.follows.to_string(), true)
        .field("Followers", user.followers.to_string(), true)
        .field(
            "Playlists",
            format!("{} ({} subscribers)", user.playlist_count, user.subscribed_playlist_count),
            true,
        );

    if let Some(signature) = &user.signature {
        embed = embed.description(truncate(signature, DESCRIPTION_LIMIT));
    }
    if let Some(avatar) = &user.avatar_url {
        embed = embed.thumbnail(avatar);
    }
    if let Some(background) = &user.background_url {
        embed = embed.image(background);
    }

    let since = user
        .created_at
        .map_or_else(|| "unknown".to_string(), format_date);
    embed.footer(CreateEmbedFooter::new(format!("User {} • joined {}", user.user_id, since)))
}

pub fn account(status: &LoginStatus) -> CreateEmbed {
    match &status.profile {
        Some(user) if status.logged_in => profile(user).title(format!("🔑 Logged in as {}", user.nickname)),
        _ => CreateEmbed::default()
            .title("🔑 Not logged in")
            .description("The provider cookie is missing or expired; VIP tracks will be unavailable.")
            .color(colors::ERROR_RED)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
    }
}

/// Final state of the `playlist` progress message.
pub fn playlist_summary(playlist: &Playlist, enqueued: usize, failed: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(truncate(&format!("📋 {}", playlist.name), 256))
        .url(playlist.page_url())
        .description(format!("All songs have been added to the player queue! ({enqueued} enqueued)"))
        .color(if failed == 0 { colors::SUCCESS_GREEN } else { colors::LYRIC_ORANGE })
        .field("Tracks", playlist.track_count.to_string(), true)
        .field("Plays", playlist.play_count.to_string(), true);

    if let Some(creator) = &playlist.creator {
        embed = embed.field("Creator", creator, true);
    }
    if failed > 0 {
        embed = embed.field("Skipped", format!("{failed} unavailable"), true);
    }
    if let Some(about) = playlist.description.as_deref().filter(|d| !d.trim().is_empty()) {
        embed = embed.field("About", truncate(about, FIELD_LIMIT), false);
    }
    if let Some(cover) = &playlist.cover_url {
        embed = embed.thumbnail(cover);
    }
    embed.timestamp(Timestamp::now())
}

/// `sections` holds one `(group, [(usage, description)])` pair per enabled
/// command group.
pub fn help(prefix: &str, sections: &[(&str, Vec<(&str, &str)>)]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Commands")
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    for (group, commands) in sections {
        let lines = commands
            .iter()
            .map(|(usage, description)| format!("`{prefix}{usage}` {description}"))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field(*group, truncate(&lines, FIELD_LIMIT), false);
    }
    embed
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() {
        "-"
    } else {
        text
    }
}
