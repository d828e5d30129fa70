use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.ini";
const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

/// Runtime configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // Discord
    pub prefix: String,
    pub token: String,
    pub owner_id: Option<u64>,
    pub selection_timeout: Duration,
    pub search_limit: usize,

    // Catalog provider
    pub api_base_url: Url,
    pub cookie: String,
    pub bitrate: u32,
    pub download: bool,
    pub download_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    bot: BotSection,
    #[serde(default)]
    provider: ProviderSection,
    // `[config]` and `[cred]` are the section names older deployments used.
    #[serde(default)]
    config: LegacyBotSection,
    #[serde(default)]
    cred: LegacyCredSection,
}

#[derive(Debug, Default, Deserialize)]
struct BotSection {
    prefix: Option<String>,
    token: Option<String>,
    owner_id: Option<u64>,
    selection_timeout: Option<String>,
    search_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSection {
    base_url: Option<String>,
    cookie: Option<String>,
    bitrate: Option<u32>,
    download: Option<bool>,
    download_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyBotSection {
    prefix: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyCredSection {
    cookie: Option<String>,
    #[serde(alias = "ncmApi")]
    ncmapi: Option<String>,
}

impl Config {
    /// Loads `config.ini` (or the file named by `NCMBOT_CONFIG`) and applies
    /// `NCMBOT__SECTION__KEY` environment overrides on top.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("NCMBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let raw: RawConfig = config::Config::builder()
            .add_source(File::new(&path, FileFormat::Ini).required(false))
            .add_source(
                Environment::with_prefix("NCMBOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("reading configuration from {path}"))?
            .try_deserialize()
            .context("configuration has an unexpected shape")?;

        let config = Self::from_raw(raw)?;
        std::fs::create_dir_all(&config.download_dir)
            .with_context(|| format!("creating {}", config.download_dir.display()))?;

        Ok(config)
    }

    /// Builds a configuration from INI text alone, without touching the
    /// environment or the filesystem.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_ini_str(ini: &str) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(File::from_str(ini, FileFormat::Ini))
            .build()?
            .try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let RawConfig {
            bot,
            provider,
            config: legacy_bot,
            cred,
        } = raw;

        let selection_timeout = match bot.selection_timeout {
            Some(text) => humantime::parse_duration(text.trim())
                .with_context(|| format!("invalid selection_timeout `{text}`"))?,
            None => Duration::from_secs(30),
        };

        let base_url = provider
            .base_url
            .or(cred.ncmapi)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_base_url = parse_base_url(&base_url)?;

        let config = Self {
            prefix: bot.prefix.or(legacy_bot.prefix).unwrap_or_else(|| "!".to_string()),
            token: bot.token.or(legacy_bot.token).unwrap_or_default(),
            owner_id: bot.owner_id,
            selection_timeout,
            search_limit: bot.search_limit.unwrap_or(10),
            api_base_url,
            cookie: provider.cookie.or(cred.cookie).unwrap_or_default(),
            bitrate: provider.bitrate.unwrap_or(320_000),
            download: provider.download.unwrap_or(true),
            download_dir: provider.download_dir.unwrap_or_else(|| PathBuf::from("songs")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that catch the usual configuration mistakes before the
    /// bot connects anywhere.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            anyhow::bail!("bot token is missing (set [bot] token or NCMBOT__BOT__TOKEN)");
        }

        if self.prefix.trim().is_empty() {
            anyhow::bail!("command prefix must not be empty");
        }

        if self.search_limit == 0 || self.search_limit >= 50 {
            anyhow::bail!("search_limit must be between 1 and 49, got: {}", self.search_limit);
        }

        if !(32_000..=999_000).contains(&self.bitrate) {
            anyhow::bail!("bitrate must be between 32000 and 999000, got: {}", self.bitrate);
        }

        if self.selection_timeout.is_zero() {
            anyhow::bail!("selection_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Non-secret summary for the startup log.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Bot: prefix `{}`, owner {}, selection timeout {}, {} results per search\n  \
            Provider: {} (cookie {}), {}kbps, download={} into {}",
            self.prefix,
            self.owner_id.map_or("from application info".to_string(), |id| id.to_string()),
            humantime::format_duration(self.selection_timeout),
            self.search_limit,
            self.api_base_url,
            if self.cookie.is_empty() { "unset" } else { "set" },
            self.bitrate / 1000,
            self.download,
            self.download_dir.display(),
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // Url::join drops the last path segment unless it ends with a slash.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).with_context(|| format!("invalid provider base_url `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_current_layout() {
        let config = Config::from_ini_str(
            "[bot]\nprefix = ?\ntoken = abc\nselection_timeout = 45s\n\
             [provider]\nbase_url = https://ncm.example.com/api\ncookie = MUSIC_U=1\ndownload = false\n",
        )
        .unwrap();

        assert_eq!(config.prefix, "?");
        assert_eq!(config.token, "abc");
        assert_eq!(config.selection_timeout, Duration::from_secs(45));
        assert_eq!(config.api_base_url.as_str(), "https://ncm.example.com/api/");
        assert_eq!(config.cookie, "MUSIC_U=1");
        assert!(!config.download);
        assert_eq!(config.bitrate, 320_000);
        assert_eq!(config.download_dir, PathBuf::from("songs"));
    }

    #[test]
    fn test_accepts_legacy_sections() {
        let config = Config::from_ini_str(
            "[config]\nprefix = .\ntoken = legacy\n[cred]\ncookie = c\nncmApi = https://ncm-api.example.com/\n",
        )
        .unwrap();

        assert_eq!(config.prefix, ".");
        assert_eq!(config.token, "legacy");
        assert_eq!(config.cookie, "c");
        assert_eq!(config.api_base_url.as_str(), "https://ncm-api.example.com/");
        assert_eq!(config.selection_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_missing_token() {
        assert!(Config::from_ini_str("[bot]\nprefix = !\n").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(Config::from_ini_str("[bot]\ntoken = t\nsearch_limit = 0\n").is_err());
        assert!(Config::from_ini_str("[bot]\ntoken = t\n[provider]\nbitrate = 5\n").is_err());
        assert!(Config::from_ini_str("[bot]\ntoken = t\nselection_timeout = soon\n").is_err());
    }

    #[test]
    fn test_summary_hides_secrets() {
        let config = Config::from_ini_str("[bot]\ntoken = very-secret\n[provider]\ncookie = MUSIC_U=xyz\n").unwrap();
        let summary = config.summary();
        assert!(!summary.contains("very-secret"));
        assert!(!summary.contains("MUSIC_U"));
        assert!(summary.contains("cookie set"));
    }
}
