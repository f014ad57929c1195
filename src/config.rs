//! Run configuration loaded from YAML.
//!
//! Registries (query languages, feed label → URL tables), limits, pacing and
//! output locations all live in one document. The default document is
//! embedded from `config/sources.yaml`; `--config` points at a replacement.

use crate::pacer::PacingPolicy;
use crate::scrapers::github_trending::Period;
use crate::scrapers::hackernews::StoryList;
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_CONFIG: &str = include_str!("../config/sources.yaml");

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trending: TrendingConfig,
    pub hackernews: HackerNewsConfig,
    pub feeds: FeedsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingConfig {
    pub base_url: String,
    /// Origin that relative repository links are resolved against.
    pub site_url: String,
    pub languages: Vec<String>,
    #[serde(default)]
    pub period: Period,
    pub max_items: usize,
    pub timeout_secs: u64,
    pub pacing: PacingPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HackerNewsConfig {
    pub base_url: String,
    /// Prefix of the discussion permalink; the item id is appended.
    pub item_url_base: String,
    #[serde(default)]
    pub list: StoryList,
    pub limit: usize,
    pub timeout_secs: u64,
    pub pacing: PacingPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    pub limit_per_feed: usize,
    #[serde(default = "default_true")]
    pub include_secondary: bool,
    pub timeout_secs: u64,
    pub pacing: PacingPolicy,
    #[serde(flatten)]
    pub registry: FeedRegistry,
}

/// One syndication feed: a human label and its URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub label: String,
    pub url: String,
}

/// Primary and secondary (alternate-locale) feed tables, in iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedRegistry {
    #[serde(default)]
    pub primary: Vec<FeedSource>,
    #[serde(default)]
    pub secondary: Vec<FeedSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    /// Second location that receives a copy of the latest snapshot.
    pub publish_dir: PathBuf,
    pub latest_story_cap: usize,
    pub latest_article_cap: usize,
}

fn default_true() -> bool {
    true
}

impl TrendingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HackerNewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FeedsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Parse a configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The embedded default configuration.
    pub fn embedded() -> Result<Self, Box<dyn Error>> {
        Self::from_yaml(DEFAULT_CONFIG)
    }

    /// Load from `path`, or fall back to the embedded default.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .map_err(|e| format!("reading config {}: {e}", path.display()))?;
                let config = Self::from_yaml(&yaml)?;
                info!(config_path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            None => {
                let config = Self::embedded()?;
                info!("Loaded embedded default configuration");
                Ok(config)
            }
        }
    }
}
