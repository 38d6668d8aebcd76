use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::CategoryKey;
use crate::projection::DEFAULT_SUMMARY_LIMIT;
use crate::submission::DEFAULT_SUBMISSION_TIMEOUT;

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid variable regex"));

/// Bot configuration, read from `~/.tradepost/config.toml`
///
/// ```toml
/// data_dir = "${HOME}/.tradepost/data"
/// summary_limit = 10
/// submission_timeout_secs = 60
/// summary_channel = "1380764000000000000"
///
/// [category_channels]
/// "PC Hardcore Ladder" = "1380765029598629908"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    /// Directory holding `trades.json` and `offers.json`
    pub data_dir: PathBuf,
    /// Rows shown in the "latest trades" summary
    pub summary_limit: usize,
    /// How long a command waits for its modal
    pub submission_timeout_secs: u64,
    /// Channel carrying the pinned summary
    pub summary_channel: Option<String>,
    /// Announcement channel per category, keyed by "PC Hardcore Ladder"
    pub category_channels: BTreeMap<String, String>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_home().join("data"),
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            submission_timeout_secs: DEFAULT_SUBMISSION_TIMEOUT.as_secs(),
            summary_channel: None,
            category_channels: BTreeMap::new(),
        }
    }
}

impl TradeConfig {
    /// Load from `$TRADEPOST_CONFIG` or `~/.tradepost/config.toml`.
    ///
    /// A missing file yields the defaults; environment overrides apply either
    /// way.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`TradeConfig::load`], reading `path` instead of the default
    /// location when given.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file and expand `${VAR}` references from the
    /// environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content, |key| env::var(key).ok())
    }

    fn parse(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).context("Failed to parse config file (invalid TOML)")?;
        config.expand_variables(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Config file path: `$TRADEPOST_CONFIG`, else `~/.tradepost/config.toml`
    pub fn config_path() -> PathBuf {
        env::var_os("TRADEPOST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::default_home().join("config.toml"))
    }

    fn default_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tradepost")
    }

    /// `TRADEPOST_DATA_DIR` and `TRADEPOST_SUMMARY_CHANNEL` win over the file.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("TRADEPOST_DATA_DIR").filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(channel) = lookup("TRADEPOST_SUMMARY_CHANNEL").filter(|v| !v.is_empty()) {
            self.summary_channel = Some(channel);
        }
    }

    fn expand_variables(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        self.data_dir = PathBuf::from(Self::expand_string(&self.data_dir.display().to_string(), lookup));
        if let Some(channel) = &self.summary_channel {
            self.summary_channel = Some(Self::expand_string(channel, lookup));
        }
        for channel in self.category_channels.values_mut() {
            *channel = Self::expand_string(channel, lookup);
        }
    }

    /// Expand `${VAR}` references; unknown variables expand to nothing.
    fn expand_string(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
        VAR_RE
            .replace_all(s, |caps: &Captures| lookup(&caps[1]).unwrap_or_default())
            .into_owned()
    }

    fn validate(&self) -> Result<()> {
        if self.summary_limit == 0 {
            anyhow::bail!("summary_limit must be at least 1");
        }
        if self.submission_timeout_secs == 0 {
            anyhow::bail!("submission_timeout_secs must be at least 1");
        }
        for key in self.category_channels.keys() {
            if Self::parse_category(key).is_none() {
                anyhow::bail!(
                    "Unknown category '{}' in [category_channels] (expected e.g. \"PC Hardcore Ladder\")",
                    key
                );
            }
        }
        Ok(())
    }

    fn parse_category(key: &str) -> Option<CategoryKey> {
        let (platform, rest) = key.split_once(' ')?;
        let (mode, ladder) = rest.split_once(' ')?;
        Some(CategoryKey {
            platform: platform.parse().ok()?,
            mode: mode.parse().ok()?,
            ladder: ladder.parse().ok()?,
        })
    }

    /// Configured channel for a category, if any
    pub fn category_channel(&self, category: &CategoryKey) -> Option<&str> {
        let wanted = category.to_string();
        self.category_channels
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&wanted))
            .map(|(_, channel)| channel.as_str())
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_str).context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
