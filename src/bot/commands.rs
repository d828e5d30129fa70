use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::info;

use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Basic,
    Admin,
    Player,
    Account,
}

impl Group {
    pub const ALL: [Group; 4] = [Group::Basic, Group::Admin, Group::Player, Group::Account];

    pub fn name(self) -> &'static str {
        match self {
            Group::Basic => "basic",
            Group::Admin => "admin",
            Group::Player => "player",
            Group::Account => "account",
        }
    }

    pub fn parse(name: &str) -> Result<Self, CommandError> {
        Self::ALL
            .into_iter()
            .find(|group| group.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CommandError::UnknownGroup(name.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Greet,
    Ping,
    Help,
    Logout,
    Load,
    Unload,
    Reload,
    Join,
    Move,
    Leave,
    Search,
    Play,
    Playlist,
    Queue,
    NowPlaying,
    Skip,
    Pause,
    Resume,
    Stop,
    Shuffle,
    Remove,
    Lyric,
    Comments,
    Account,
    User,
}

#[derive(Debug)]
pub struct CommandSpec {
    pub command: Command,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub group: Group,
    pub owner_only: bool,
    /// Left out of `help`.
    pub hidden: bool,
    pub usage: &'static str,
    pub description: &'static str,
}

impl CommandSpec {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

macro_rules! command {
    ($command:ident, $name:literal, [$($alias:literal),*], $group:ident, $usage:literal, $description:literal) => {
        command!($command, $name, [$($alias),*], $group, false, false, $usage, $description)
    };
    ($command:ident, $name:literal, [$($alias:literal),*], $group:ident, $owner:literal, $hidden:literal, $usage:literal, $description:literal) => {
        CommandSpec {
            command: Command::$command,
            name: $name,
            aliases: &[$($alias),*],
            group: Group::$group,
            owner_only: $owner,
            hidden: $hidden,
            usage: $usage,
            description: $description,
        }
    };
}

pub static COMMANDS: &[CommandSpec] = &[
    command!(Greet, "greet", ["hello", "sup", "hi"], Basic, "greet", "Greets you."),
    command!(Ping, "ping", [], Basic, "ping", "Shows the latency to Discord."),
    command!(Help, "help", ["h"], Basic, "help", "Lists the available commands."),
    command!(Logout, "logout", [], Basic, true, true, "logout", "Shuts the bot down."),
    command!(Load, "load", [], Admin, true, true, "load <group>", "Enables a command group."),
    command!(Unload, "unload", [], Admin, true, true, "unload <group>", "Disables a command group."),
    command!(Reload, "reload", [], Admin, true, true, "reload <group>", "Re-enables a command group."),
    command!(Join, "join", ["connect"], Player, "join", "Joins your voice channel."),
    command!(Move, "move", ["summon"], Player, "move", "Moves the bot to your voice channel."),
    command!(Leave, "leave", ["disconnect", "dc"], Player, "leave", "Clears the queue and leaves voice."),
    command!(Search, "search", ["find"], Player, "search <keywords> [-N]", "Looks up a song id, showing N results."),
    command!(Play, "play", ["p"], Player, "play <id | link | keywords>", "Plays a song or adds it to the queue."),
    command!(Playlist, "playlist", ["pl"], Player, "playlist <id | link>", "Queues every song of a playlist."),
    command!(Queue, "queue", ["q"], Player, "queue [page]", "Shows the queue."),
    command!(NowPlaying, "nowplaying", ["np", "current"], Player, "nowplaying", "Shows the current song."),
    command!(Skip, "skip", ["s", "next"], Player, "skip", "Skips the current song."),
    command!(Pause, "pause", [], Player, "pause", "Pauses playback."),
    command!(Resume, "resume", ["unpause"], Player, "resume", "Resumes playback."),
    command!(Stop, "stop", [], Player, "stop", "Stops playback and clears the queue."),
    command!(Shuffle, "shuffle", [], Player, "shuffle", "Shuffles the queue."),
    command!(Remove, "remove", ["rm"], Player, "remove <position>", "Removes a song from the queue."),
    command!(Lyric, "lyric", ["lyrics", "ly"], Player, "lyric", "Shows the lyric of the current song."),
    command!(Comments, "comments", [], Player, "comments [id]", "Shows hot comments of a song."),
    command!(Account, "account", [], Account, true, false, "account", "Shows the provider login status."),
    command!(User, "user", ["profile"], Account, "user <uid>", "Shows a provider user profile."),
];

/// Looks a command up by name or alias, case-insensitively.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.matches(name))
}

/// Splits `<prefix><name> <args>` into the name and the trimmed rest.
pub fn parse_invocation<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let body = content.strip_prefix(prefix)?;
    let body = body.trim_start();
    if body.is_empty() {
        return None;
    }

    match body.split_once(char::is_whitespace) {
        Some((name, args)) => Some((name, args.trim())),
        None => Some((body, "")),
    }
}

/// Command groups currently enabled. Every group starts enabled.
pub struct GroupToggles {
    enabled: RwLock<HashSet<Group>>,
}

impl Default for GroupToggles {
    fn default() -> Self {
        Self {
            enabled: RwLock::new(Group::ALL.into_iter().collect()),
        }
    }
}

impl GroupToggles {
    pub fn is_enabled(&self, group: Group) -> bool {
        self.enabled.read().contains(&group)
    }

    pub fn load(&self, group: Group) -> Result<(), CommandError> {
        if !self.enabled.write().insert(group) {
            return Err(CommandError::BadArgument(format!("`{}` commands are already loaded", group.name())));
        }
        info!("🔌 Enabled {} commands", group.name());
        Ok(())
    }

    pub fn unload(&self, group: Group) -> Result<(), CommandError> {
        if group == Group::Admin {
            return Err(CommandError::BadArgument("`admin` commands cannot be unloaded".to_string()));
        }
        if !self.enabled.write().remove(&group) {
            return Err(CommandError::BadArgument(format!("`{}` commands are not loaded", group.name())));
        }
        info!("🔌 Disabled {} commands", group.name());
        Ok(())
    }

    /// Enables `group`, whether or not it was enabled before.
    pub fn reload(&self, group: Group) {
        self.enabled.write().insert(group);
        info!("🔌 Reloaded {} commands", group.name());
    }

    /// Visible commands of the enabled groups, in table order.
    pub fn visible(&self) -> Vec<&'static CommandSpec> {
        let enabled = self.enabled.read();
        COMMANDS
            .iter()
            .filter(|spec| !spec.hidden && enabled.contains(&spec.group))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_resolves_aliases() {
        assert_eq!(find("play").map(|s| s.command), Some(Command::Play));
        assert_eq!(find("p").map(|s| s.command), Some(Command::Play));
        assert_eq!(find("NP").map(|s| s.command), Some(Command::NowPlaying));
        assert_eq!(find("dc").map(|s| s.command), Some(Command::Leave));
        assert_eq!(find("sup").map(|s| s.command), Some(Command::Greet));
        assert!(find("volume").is_none());
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for spec in COMMANDS {
            for name in std::iter::once(&spec.name).chain(spec.aliases) {
                assert!(seen.insert(*name), "`{name}` is used twice");
            }
        }
    }

    #[test]
    fn test_parse_invocation() {
        assert_eq!(parse_invocation("!play 晴天 -5", "!"), Some(("play", "晴天 -5")));
        assert_eq!(parse_invocation("!skip", "!"), Some(("skip", "")));
        assert_eq!(parse_invocation("nc! queue  2 ", "nc!"), Some(("queue", "2")));
        assert_eq!(parse_invocation("!", "!"), None);
        assert_eq!(parse_invocation("play", "!"), None);
    }

    #[test]
    fn test_group_parse() {
        assert_eq!(Group::parse("Player").unwrap(), Group::Player);
        assert!(matches!(Group::parse("music"), Err(CommandError::UnknownGroup(name)) if name == "music"));
    }

    #[test]
    fn test_toggles() {
        let toggles = GroupToggles::default();
        assert!(toggles.is_enabled(Group::Player));

        toggles.unload(Group::Player).unwrap();
        assert!(!toggles.is_enabled(Group::Player));
        assert!(toggles.unload(Group::Player).is_err());
        assert!(toggles.visible().iter().all(|spec| spec.group != Group::Player));

        toggles.load(Group::Player).unwrap();
        assert!(toggles.load(Group::Player).is_err());

        assert!(toggles.unload(Group::Admin).is_err());
        assert!(toggles.is_enabled(Group::Admin));

        toggles.unload(Group::Account).unwrap();
        toggles.reload(Group::Account);
        assert!(toggles.is_enabled(Group::Account));
    }

    #[test]
    fn test_hidden_commands_are_not_listed() {
        let toggles = GroupToggles::default();
        let visible = toggles.visible();
        assert!(visible.iter().all(|spec| !spec.hidden));
        assert!(visible.iter().any(|spec| spec.command == Command::Account));
        assert!(!visible.iter().any(|spec| spec.command == Command::Logout));
    }
}
