//! One aggregation run across the three sources.
//!
//! Each source gets its own paced transport, so the sources run concurrently
//! while every origin keeps its own concurrency ceiling and spacing. A source
//! that fails entirely contributes an empty collection; the run itself never
//! fails.

use crate::config::Config;
use crate::http::{Fetch, HttpFetcher, Paced};
use crate::models::{RunResult, Statistics};
use crate::scrapers::github_trending::GithubTrending;
use crate::scrapers::hackernews::HackerNews;
use crate::scrapers::rss_feeds::FeedReader;
use crate::utils::format_iso;
use chrono::{DateTime, Local};
use std::error::Error;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct Aggregator<F> {
    config: Config,
    trending: Paced<F>,
    hackernews: Paced<F>,
    feeds: Paced<F>,
}

impl Aggregator<HttpFetcher> {
    /// Build one HTTP client per source with that source's timeout and pacing.
    pub fn from_config(config: Config) -> Result<Self, Box<dyn Error>> {
        let trending = HttpFetcher::new(config.trending.timeout())?;
        let hackernews = HttpFetcher::new(config.hackernews.timeout())?;
        let feeds = HttpFetcher::new(config.feeds.timeout())?;
        Ok(Self::with_fetchers(config, trending, hackernews, feeds))
    }
}

impl<F: Fetch> Aggregator<F> {
    pub fn with_fetchers(config: Config, trending: F, hackernews: F, feeds: F) -> Self {
        Self {
            trending: Paced::new(trending, config.trending.pacing),
            hackernews: Paced::new(hackernews, config.hackernews.pacing),
            feeds: Paced::new(feeds, config.feeds.pacing),
            config,
        }
    }

    /// Run every source once, capturing the current local time.
    pub async fn run(&self) -> RunResult {
        self.run_at(Local::now()).await
    }

    /// Run every source once with an explicit capture time.
    ///
    /// The capture time stamps the run and stands in for missing record times.
    #[instrument(level = "info", skip(self))]
    pub async fn run_at(&self, captured_at: DateTime<Local>) -> RunResult {
        let trending_cfg = &self.config.trending;
        let hn_cfg = &self.config.hackernews;
        let feeds_cfg = &self.config.feeds;

        let trending = GithubTrending::new(&self.trending, trending_cfg, captured_at);
        let hackernews = HackerNews::new(&self.hackernews, hn_cfg);
        let feeds = FeedReader::new(&self.feeds, feeds_cfg, captured_at);

        info!(
            languages = trending_cfg.languages.len(),
            feeds = feeds_cfg.registry.primary.len() + feeds_cfg.registry.secondary.len(),
            "Starting aggregation run"
        );

        let (github_trending, hackernews, rss_feeds) = tokio::join!(
            trending.fetch_many(
                &trending_cfg.languages,
                trending_cfg.period,
                trending_cfg.max_items
            ),
            hackernews.stories(hn_cfg.list, hn_cfg.limit),
            feeds.parse_all(feeds_cfg.limit_per_feed, feeds_cfg.include_secondary),
        );

        let run = RunResult {
            timestamp: format_iso(&captured_at),
            date: captured_at.format("%Y-%m-%d").to_string(),
            github_trending,
            hackernews,
            rss_feeds,
        };
        log_statistics(&run.statistics());
        run
    }
}

fn log_statistics(stats: &Statistics) {
    info!(repos = stats.github_repos, "GitHub Trending");
    for (language, count) in stats.by_language.iter() {
        info!(%language, count, "Trending repositories by language");
    }
    info!(stories = stats.hackernews_stories, "Hacker News");
    info!(articles = stats.rss_articles, "Feeds");
    if stats.by_feed.is_empty() {
        warn!("No feed returned any articles");
    }
    for (feed, count) in stats.by_feed.iter() {
        info!(%feed, count, "Articles by feed");
    }
    info!(total = stats.total, "Aggregation run complete");
}
