//! Data models shared by every source adapter and the snapshot writer.
//!
//! - [`NormalizedRecord`]: the one canonical record shape every adapter emits
//! - [`Metrics`]: kind-specific payload, discriminated by [`SourceKind`]
//! - [`Grouped`]: an insertion-ordered label → value mapping
//! - [`RunResult`]: everything one run collected, plus [`Statistics`] over it
//!
//! Records serialize flat: the metric fields sit next to `title`/`url` and the
//! `source_kind` tag says which metric shape to expect.

use itertools::Itertools;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Placeholder title used when a source omits one.
pub const NO_TITLE: &str = "No Title";

/// Which adapter produced a record, and therefore which [`Metrics`] it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Repo,
    Story,
    Article,
}

/// Counters scraped from a trending-listing row.
///
/// All counts are digit-only strings (`"1,234"` is stored as `"1234"`), and a
/// missing badge is stored as `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoMetrics {
    /// `owner/repo` identifier.
    pub name: String,
    pub description: String,
    /// Language badge shown on the row, `"Unknown"` when absent.
    pub language: String,
    pub stars: String,
    pub forks: String,
    pub stars_today: String,
}

/// Fields of a story item from the item-graph API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoryMetrics {
    pub id: u64,
    pub score: u64,
    pub comments: u64,
    pub author: String,
    /// Publication time, `YYYY-MM-DD HH:MM:SS` UTC.
    pub time: String,
    /// Publication time in epoch seconds, `0` when the item had none.
    pub epoch: i64,
    /// Discussion permalink.
    pub hn_url: String,
}

/// Fields of a syndication entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleMetrics {
    /// Feed label, repeated under the name front ends read.
    pub source: String,
    /// Resolved publication time, repeated under the name front ends read.
    pub published: String,
    pub author: String,
    /// Plain-text summary, capped at [`crate::utils::SUMMARY_MAX_CHARS`].
    pub summary: String,
}

/// Kind-specific payload of a [`NormalizedRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "source_kind", rename_all = "lowercase")]
pub enum Metrics {
    Repo(RepoMetrics),
    Story(StoryMetrics),
    Article(ArticleMetrics),
}

impl Metrics {
    pub fn kind(&self) -> SourceKind {
        match self {
            Metrics::Repo(_) => SourceKind::Repo,
            Metrics::Story(_) => SourceKind::Story,
            Metrics::Article(_) => SourceKind::Article,
        }
    }
}

/// The canonical output unit, one shape regardless of source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NormalizedRecord {
    /// Never empty; adapters substitute [`NO_TITLE`] or drop the item.
    pub title: String,
    /// Absolute URL, or empty when the source provides none.
    pub url: String,
    /// Feed name, queried language, or story list the record came from.
    pub source_label: String,
    /// Best-effort publication time, capture time when the source has none.
    pub timestamp: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

impl NormalizedRecord {
    pub fn source_kind(&self) -> SourceKind {
        self.metrics.kind()
    }
}

/// An insertion-ordered mapping from a label to a value.
///
/// Serializes as a JSON object whose keys keep the order they were pushed in,
/// so per-language and per-feed groupings come out in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouped<V>(Vec<(String, V)>);

impl<V> Default for Grouped<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Grouped<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `label`, replacing an earlier entry with the same label.
    pub fn insert(&mut self, label: impl Into<String>, value: V) {
        let label = label.into();
        match self.0.iter_mut().find(|(k, _)| *k == label) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == label).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for Grouped<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut grouped = Grouped::new();
        for (label, value) in iter {
            grouped.insert(label, value);
        }
        grouped
    }
}

impl<V: Serialize> Serialize for Grouped<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Trending repositories keyed by the query language, in query order.
pub type TrendingByLanguage = Grouped<Vec<NormalizedRecord>>;

/// Everything one run collected.
///
/// Built once by the aggregator and handed to a snapshot sink; nothing here
/// outlives the run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Capture time, ISO-8601 local time.
    pub timestamp: String,
    /// Capture date label, `YYYY-MM-DD`.
    pub date: String,
    pub github_trending: TrendingByLanguage,
    pub hackernews: Vec<NormalizedRecord>,
    pub rss_feeds: Vec<NormalizedRecord>,
}

impl RunResult {
    /// Recompute the statistics block from the current collections.
    pub fn statistics(&self) -> Statistics {
        let by_language: Grouped<usize> = self
            .github_trending
            .iter()
            .map(|(lang, repos)| (lang.to_string(), repos.len()))
            .collect();

        let by_feed: Grouped<usize> = self
            .rss_feeds
            .iter()
            .counts_by(|record| record.source_label.clone())
            .into_iter()
            .sorted()
            .collect();

        let github_repos = by_language.iter().map(|(_, n)| *n).sum();
        let hackernews_stories = self.hackernews.len();
        let rss_articles = self.rss_feeds.len();

        Statistics {
            github_repos,
            hackernews_stories,
            rss_articles,
            total: github_repos + hackernews_stories + rss_articles,
            by_language,
            by_feed,
        }
    }
}

/// Counts per source, per sub-group, and overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub github_repos: usize,
    pub hackernews_stories: usize,
    pub rss_articles: usize,
    pub total: usize,
    pub by_language: Grouped<usize>,
    /// Article counts per feed label, sorted by label.
    pub by_feed: Grouped<usize>,
}
