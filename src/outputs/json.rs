//! JSON snapshot files for downstream consumers.
//!
//! Field names and nesting are a compatibility surface; front ends read these
//! files directly.
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── github_trending.json   # {timestamp, date, data}
//! ├── hackernews.json        # {timestamp, date, data}
//! ├── rss_feeds.json         # {timestamp, date, data}
//! ├── latest.json            # capped snapshot + statistics
//! └── archive/
//!     └── 2025-05-06.json    # uncapped full run
//!
//! publish_dir/
//! └── latest.json            # copy of data_dir/latest.json
//! ```

use crate::config::OutputConfig;
use crate::models::{NormalizedRecord, RunResult, Statistics, TrendingByLanguage};
use crate::utils::ensure_writable_dir;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Receives each completed run exactly once.
#[allow(async_fn_in_trait)]
pub trait SnapshotSink {
    /// Persist `run`, returning the files that were written.
    async fn persist(&self, run: &RunResult) -> Result<Vec<PathBuf>, Box<dyn Error>>;
}

#[derive(Serialize)]
struct SourceFile<'a, T: Serialize + ?Sized> {
    timestamp: &'a str,
    date: &'a str,
    data: &'a T,
}

#[derive(Serialize)]
struct LatestSnapshot<'a> {
    updated_at: &'a str,
    date: &'a str,
    github_trending: &'a TrendingByLanguage,
    hackernews: &'a [NormalizedRecord],
    rss_feeds: &'a [NormalizedRecord],
    statistics: Statistics,
}

#[derive(Serialize)]
struct Archive<'a> {
    date: &'a str,
    timestamp: &'a str,
    github_trending: &'a TrendingByLanguage,
    hackernews: &'a [NormalizedRecord],
    rss_feeds: &'a [NormalizedRecord],
}

/// Writes a run as pretty-printed JSON files.
#[derive(Debug, Clone)]
pub struct JsonSnapshotWriter {
    data_dir: PathBuf,
    publish_dir: PathBuf,
    story_cap: usize,
    article_cap: usize,
}

impl JsonSnapshotWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            publish_dir: config.publish_dir.clone(),
            story_cap: config.latest_story_cap,
            article_cap: config.latest_article_cap,
        }
    }

    pub fn archive_path(&self, date: &str) -> PathBuf {
        self.data_dir.join("archive").join(format!("{date}.json"))
    }

    fn latest<'a>(&self, run: &'a RunResult) -> LatestSnapshot<'a> {
        LatestSnapshot {
            updated_at: &run.timestamp,
            date: &run.date,
            github_trending: &run.github_trending,
            hackernews: &run.hackernews[..run.hackernews.len().min(self.story_cap)],
            rss_feeds: &run.rss_feeds[..run.rss_feeds.len().min(self.article_cap)],
            statistics: run.statistics(),
        }
    }
}

impl SnapshotSink for JsonSnapshotWriter {
    /// Write every snapshot file.
    ///
    /// Fails only when the data directory is unusable. A file that cannot be
    /// written is logged and left out of the returned list; the rest are
    /// still attempted.
    #[instrument(level = "info", skip_all, fields(date = %run.date))]
    async fn persist(&self, run: &RunResult) -> Result<Vec<PathBuf>, Box<dyn Error>> {
        ensure_writable_dir(&self.data_dir.join("archive")).await?;

        let latest = self.latest(run);
        let mut pending: Vec<(PathBuf, Result<String, serde_json::Error>)> = vec![
            (
                self.data_dir.join("github_trending.json"),
                to_json(&SourceFile {
                    timestamp: &run.timestamp,
                    date: &run.date,
                    data: &run.github_trending,
                }),
            ),
            (
                self.data_dir.join("hackernews.json"),
                to_json(&SourceFile {
                    timestamp: &run.timestamp,
                    date: &run.date,
                    data: run.hackernews.as_slice(),
                }),
            ),
            (
                self.data_dir.join("rss_feeds.json"),
                to_json(&SourceFile {
                    timestamp: &run.timestamp,
                    date: &run.date,
                    data: run.rss_feeds.as_slice(),
                }),
            ),
            (self.data_dir.join("latest.json"), to_json(&latest)),
            (
                self.archive_path(&run.date),
                to_json(&Archive {
                    date: &run.date,
                    timestamp: &run.timestamp,
                    github_trending: &run.github_trending,
                    hackernews: &run.hackernews,
                    rss_feeds: &run.rss_feeds,
                }),
            ),
        ];

        match ensure_writable_dir(&self.publish_dir).await {
            Ok(()) => pending.push((self.publish_dir.join("latest.json"), to_json(&latest))),
            Err(e) => error!(
                path = %self.publish_dir.display(),
                error = %e,
                "Publish directory is not writable; skipping mirrored snapshot"
            ),
        }

        let mut written = Vec::with_capacity(pending.len());
        for (path, json) in pending {
            match write_file(&path, json).await {
                Ok(()) => {
                    info!(path = %path.display(), "Wrote snapshot file");
                    written.push(path);
                }
                Err(e) => error!(path = %path.display(), error = %e, "Failed writing snapshot file"),
            }
        }
        Ok(written)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

async fn write_file(
    path: &Path,
    json: Result<String, serde_json::Error>,
) -> Result<(), Box<dyn Error>> {
    fs::write(path, json?).await?;
    Ok(())
}
