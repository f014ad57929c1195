//! Syndication feed adapter.
//!
//! Reads every feed in the configured registry (primary first, then the
//! secondary alternate-locale set) and normalizes each entry into an article
//! record labelled with the feed's name.
//!
//! Failure isolation:
//! - a feed that cannot be fetched is logged and contributes nothing
//! - a feed that turns malformed part-way keeps the entries read before it
//! - an entry that cannot be decoded is skipped on its own

use crate::config::{FeedRegistry, FeedSource, FeedsConfig};
use crate::http::Fetch;
use crate::models::{ArticleMetrics, Grouped, Metrics, NO_TITLE, NormalizedRecord};
use crate::scrapers::feed_xml::{RawEntry, parse_feed};
use crate::utils::{
    decode_entities, format_display, parse_feed_time, strip_markup, truncate_summary,
};
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// Author used when an entry names none.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Which registry table a feed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedCategory {
    Primary,
    Secondary,
}

impl FeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedCategory::Primary => "primary",
            FeedCategory::Secondary => "secondary",
        }
    }
}

impl fmt::Display for FeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct FeedReader<F> {
    fetch: F,
    registry: FeedRegistry,
    concurrency: usize,
    captured_at: DateTime<Local>,
}

impl<F: Fetch> FeedReader<F> {
    pub fn new(fetch: F, config: &FeedsConfig, captured_at: DateTime<Local>) -> Self {
        Self {
            fetch,
            registry: config.registry.clone(),
            concurrency: config.pacing.max_concurrency.max(1),
            captured_at,
        }
    }

    /// Fetch one feed and normalize up to `limit` of its entries.
    ///
    /// # Arguments
    ///
    /// * `url` - Feed document URL
    /// * `label` - Feed name stamped on every record as `source_label`
    /// * `limit` - Upper bound on entries read from the document
    ///
    /// # Returns
    ///
    /// Article records in document order. A failed fetch is logged and yields
    /// an empty list; a document that turns malformed keeps the entries read
    /// before the error.
    #[instrument(level = "info", skip(self))]
    pub async fn parse_one(&self, url: &str, label: &str, limit: usize) -> Vec<NormalizedRecord> {
        let xml = match self.fetch.get_text(url).await {
            Ok(xml) => xml,
            Err(e) => {
                error!(error = %e, %url, feed = %label, "Feed fetch failed");
                return Vec::new();
            }
        };

        let parsed = parse_feed(&xml, limit);
        if let Some(reason) = &parsed.malformed {
            warn!(
                feed = %label,
                %reason,
                kept = parsed.entries.len(),
                "Feed document is malformed; keeping entries read so far"
            );
        }

        let articles: Vec<NormalizedRecord> = parsed
            .entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry.error {
                Some(e) => {
                    warn!(feed = %label, index, error = %e, "Feed entry unreadable; skipping");
                    None
                }
                None => Some(self.normalize(label, entry)),
            })
            .collect();

        info!(count = articles.len(), feed = %label, "Parsed feed");
        articles
    }

    /// Read every registered feed and concatenate the records.
    ///
    /// # Arguments
    ///
    /// * `limit_per_feed` - Upper bound on entries taken from each feed
    /// * `include_secondary` - Whether the secondary registry is read too
    ///
    /// # Returns
    ///
    /// Records in registry order (primary, then secondary when included), then
    /// entry order within each feed. Feeds that fail contribute nothing.
    #[instrument(level = "info", skip(self))]
    pub async fn parse_all(
        &self,
        limit_per_feed: usize,
        include_secondary: bool,
    ) -> Vec<NormalizedRecord> {
        let mut sources: Vec<&FeedSource> = self.registry.primary.iter().collect();
        if include_secondary {
            sources.extend(self.registry.secondary.iter());
        }

        let per_feed: Vec<Vec<NormalizedRecord>> = stream::iter(sources)
            .map(|source| self.parse_one(&source.url, &source.label, limit_per_feed))
            .buffered(self.concurrency)
            .collect()
            .await;

        let articles: Vec<NormalizedRecord> = per_feed.into_iter().flatten().collect();
        info!(count = articles.len(), include_secondary, "Parsed all feeds");
        articles
    }

    /// Read one registry table, keyed by feed label in registry order.
    #[instrument(level = "info", skip(self))]
    pub async fn group_by_category(
        &self,
        category: FeedCategory,
        limit: usize,
    ) -> Grouped<Vec<NormalizedRecord>> {
        let sources = match category {
            FeedCategory::Primary => &self.registry.primary,
            FeedCategory::Secondary => &self.registry.secondary,
        };

        stream::iter(sources)
            .map(|source| async move {
                let articles = self.parse_one(&source.url, &source.label, limit).await;
                (source.label.clone(), articles)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    fn normalize(&self, label: &str, entry: RawEntry) -> NormalizedRecord {
        let timestamp = self.resolve_published(&entry);
        let summary = resolve_summary(&entry);
        let author = entry
            .author
            .as_deref()
            .map(decode_entities)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        NormalizedRecord {
            title: entry
                .title
                .as_deref()
                .map(decode_entities)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NO_TITLE.to_string()),
            url: entry.link.unwrap_or_default(),
            source_label: label.to_string(),
            timestamp: timestamp.clone(),
            metrics: Metrics::Article(ArticleMetrics {
                source: label.to_string(),
                published: timestamp,
                author,
                summary,
            }),
        }
    }

    /// Parsed date, else the raw date text, else the capture time.
    fn resolve_published(&self, entry: &RawEntry) -> String {
        match entry.published.as_deref().or(entry.updated.as_deref()) {
            Some(raw) => parse_feed_time(raw).unwrap_or_else(|| raw.to_string()),
            None => format_display(&self.captured_at),
        }
    }
}

/// Plain-text summary from `summary`, else `description`, else empty.
fn resolve_summary(entry: &RawEntry) -> String {
    [entry.summary.as_deref(), entry.description.as_deref()]
        .into_iter()
        .flatten()
        .next()
        .map(|html| truncate_summary(&strip_markup(html)))
        .unwrap_or_default()
}
