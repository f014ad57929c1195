//! Hacker News API client.
//!
//! Two-phase fetch against the public Firebase API:
//!
//! 1. **Indexing**: `{base_url}/{list}stories.json` returns an ordered array of
//!    item ids, truncated to the requested limit
//! 2. **Fetching**: `{base_url}/item/{id}.json` for each id
//!
//! Item fetches run concurrently through the paced transport, so the per-origin
//! ceiling and spacing still hold; results keep index order. Items that are not
//! stories, or come back `null`, are dropped. A failed item fetch is logged and
//! skipped.

use crate::config::HackerNewsConfig;
use crate::http::Fetch;
use crate::models::{Metrics, NO_TITLE, NormalizedRecord, StoryMetrics};
use crate::utils::{format_epoch, truncate_for_log};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Which ranked list to read ids from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryList {
    #[default]
    Top,
    Best,
    New,
}

impl StoryList {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryList::Top => "top",
            StoryList::Best => "best",
            StoryList::New => "new",
        }
    }
}

impl fmt::Display for StoryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw item as served by the API; every field may be absent.
#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    score: Option<u64>,
    by: Option<String>,
    time: Option<i64>,
    descendants: Option<u64>,
}

#[derive(Debug)]
pub struct HackerNews<F> {
    fetch: F,
    base_url: String,
    item_url_base: String,
    concurrency: usize,
}

impl<F: Fetch> HackerNews<F> {
    pub fn new(fetch: F, config: &HackerNewsConfig) -> Self {
        Self {
            fetch,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            item_url_base: config.item_url_base.clone(),
            concurrency: config.pacing.max_concurrency.max(1),
        }
    }

    pub async fn top_stories(&self, limit: usize) -> Vec<NormalizedRecord> {
        self.stories(StoryList::Top, limit).await
    }

    pub async fn best_stories(&self, limit: usize) -> Vec<NormalizedRecord> {
        self.stories(StoryList::Best, limit).await
    }

    pub async fn new_stories(&self, limit: usize) -> Vec<NormalizedRecord> {
        self.stories(StoryList::New, limit).await
    }

    /// Fetch up to `limit` stories from `list`, in ranking order.
    ///
    /// # Arguments
    ///
    /// * `list` - Ranked list to read ids from
    /// * `limit` - Upper bound on ids fetched; applied before any item request
    ///
    /// # Returns
    ///
    /// Story records in index order. Non-story items and failed item fetches
    /// are dropped. A failed index fetch is logged and yields an empty list.
    #[instrument(level = "info", skip(self))]
    pub async fn stories(&self, list: StoryList, limit: usize) -> Vec<NormalizedRecord> {
        let ids = match self.index(list).await {
            Ok(ids) => ids.into_iter().take(limit).collect::<Vec<_>>(),
            Err(e) => {
                error!(error = %e, %list, "Story index fetch failed");
                return Vec::new();
            }
        };
        info!(count = ids.len(), %list, "Indexed story ids");

        let stories: Vec<NormalizedRecord> = stream::iter(ids)
            .map(|id| async move {
                match self.fetch_item(id, list).await {
                    Ok(Some(story)) => {
                        debug!(id, "Fetched story");
                        Some(story)
                    }
                    Ok(None) => {
                        debug!(id, "Item is not a story; dropping");
                        None
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Story fetch failed; skipping");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(std::future::ready)
            .collect()
            .await;

        info!(count = stories.len(), %list, "Fetched stories");
        stories
    }

    async fn index(&self, list: StoryList) -> Result<Vec<u64>, Box<dyn Error>> {
        let url = format!("{}/{}stories.json", self.base_url, list);
        let body = self.fetch.get_text(&url).await?;
        let ids = serde_json::from_str::<Vec<u64>>(&body)
            .map_err(|e| format!("malformed story index ({e}): {}", truncate_for_log(&body, 120)))?;
        Ok(ids)
    }

    /// Fetch one item and normalize it.
    ///
    /// Returns `Ok(None)` for an empty or `null` body and for items whose type
    /// is not `story`.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_item(
        &self,
        id: u64,
        list: StoryList,
    ) -> Result<Option<NormalizedRecord>, Box<dyn Error>> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let body = self.fetch.get_text(&url).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let item = serde_json::from_str::<Option<Item>>(&body)
            .map_err(|e| format!("malformed item ({e}): {}", truncate_for_log(&body, 120)))?;

        Ok(item
            .filter(|item| item.kind.as_deref() == Some("story"))
            .map(|item| self.normalize(id, list, item)))
    }

    fn normalize(&self, id: u64, list: StoryList, item: Item) -> NormalizedRecord {
        let hn_url = format!("{}{}", self.item_url_base, id);
        let epoch = item.time.unwrap_or(0);
        let time = format_epoch(epoch);
        NormalizedRecord {
            title: item
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| NO_TITLE.to_string()),
            url: item
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| hn_url.clone()),
            source_label: list.to_string(),
            timestamp: time.clone(),
            metrics: Metrics::Story(StoryMetrics {
                id,
                score: item.score.unwrap_or(0),
                comments: item.descendants.unwrap_or(0),
                author: item.by.unwrap_or_else(|| "unknown".to_string()),
                time,
                epoch,
                hn_url,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::testing::FixtureFetch;
    use crate::models::SourceKind;

    const BASE: &str = "https://hacker-news.firebaseio.com/v0";

    fn client(fetch: FixtureFetch) -> HackerNews<FixtureFetch> {
        let config = Config::embedded().unwrap();
        HackerNews::new(fetch, &config.hackernews)
    }

    fn item_url(id: u64) -> String {
        format!("{BASE}/item/{id}.json")
    }

    fn story(record: &NormalizedRecord) -> &StoryMetrics {
        match &record.metrics {
            Metrics::Story(m) => m,
            other => panic!("expected story metrics, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_story_items_are_excluded() {
        let fetch = FixtureFetch::new()
            .with_page(&format!("{BASE}/topstories.json"), "[1,2,3]")
            .with_page(
                &item_url(1),
                r#"{"id":1,"type":"story","title":"First","url":"https://a.example/1","score":120,"by":"pg","time":1700000000,"descendants":42}"#,
            )
            .with_page(&item_url(2), r#"{"id":2,"type":"job","title":"Hiring"}"#)
            .with_page(&item_url(3), r#"{"id":3,"type":"story","title":"Third"}"#);
        let hn = client(fetch);

        let stories = hn.top_stories(3).await;

        assert_eq!(stories.len(), 2);
        assert_eq!(story(&stories[0]).id, 1);
        assert_eq!(story(&stories[1]).id, 3);
        assert!(stories.iter().all(|s| s.source_kind() == SourceKind::Story));
        assert!(stories.iter().all(|s| s.source_label == "top"));
    }

    #[tokio::test]
    async fn test_story_fields_and_defaults() {
        let fetch = FixtureFetch::new()
            .with_page(&format!("{BASE}/topstories.json"), "[1,3]")
            .with_page(
                &item_url(1),
                r#"{"id":1,"type":"story","title":"First","url":"https://a.example/1","score":120,"by":"pg","time":1700000000,"descendants":42}"#,
            )
            .with_page(&item_url(3), r#"{"id":3,"type":"story"}"#);
        let hn = client(fetch);

        let stories = hn.top_stories(10).await;

        let first = &stories[0];
        assert_eq!(first.title, "First");
        assert_eq!(first.url, "https://a.example/1");
        assert_eq!(first.timestamp, "2023-11-14 22:13:20");
        let m = story(first);
        assert_eq!((m.score, m.comments, m.epoch), (120, 42, 1_700_000_000));
        assert_eq!(m.time, "2023-11-14 22:13:20");
        assert_eq!(m.author, "pg");
        assert_eq!(m.hn_url, "https://news.ycombinator.com/item?id=1");

        let bare = &stories[1];
        assert_eq!(bare.title, NO_TITLE);
        assert_eq!(bare.url, "https://news.ycombinator.com/item?id=3");
        assert_eq!(bare.timestamp, "1970-01-01 00:00:00");
        let m = story(bare);
        assert_eq!((m.score, m.comments, m.epoch), (0, 0, 0));
        assert_eq!(m.time, "1970-01-01 00:00:00");
        assert_eq!(m.author, "unknown");
    }

    #[tokio::test]
    async fn test_item_failures_do_not_abort_batch() {
        let fetch = FixtureFetch::new()
            .with_page(&format!("{BASE}/beststories.json"), "[10,11,12,13,14]")
            .with_page(&item_url(10), r#"{"type":"story","title":"ok"}"#)
            .with_failure(&item_url(11), "operation timed out")
            .with_page(&item_url(12), "{not json")
            .with_page(&item_url(13), "null");
        let hn = client(fetch);

        let stories = hn.best_stories(5).await;

        assert_eq!(stories.len(), 1);
        assert_eq!(story(&stories[0]).id, 10);
        assert_eq!(stories[0].source_label, "best");
    }

    #[tokio::test]
    async fn test_limit_truncates_index_before_item_fetches() {
        let fetch = FixtureFetch::new()
            .with_page(&format!("{BASE}/newstories.json"), "[5,6,7,8]")
            .with_page(&item_url(5), r#"{"type":"story","title":"five"}"#)
            .with_page(&item_url(6), r#"{"type":"story","title":"six"}"#);
        let hn = client(fetch);

        let stories = hn.new_stories(2).await;

        assert_eq!(stories.len(), 2);
        let requested = hn.fetch.requests();
        assert!(!requested.contains(&item_url(7)));
        assert!(!requested.contains(&item_url(8)));
    }

    #[tokio::test]
    async fn test_index_failure_yields_empty_list() {
        let fetch = FixtureFetch::new()
            .with_failure(&format!("{BASE}/topstories.json"), "503 Service Unavailable");
        assert!(client(fetch).top_stories(30).await.is_empty());

        let fetch = FixtureFetch::new().with_page(&format!("{BASE}/topstories.json"), "<html>");
        assert!(client(fetch).top_stories(30).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_item_empty_body_is_excluded() {
        let fetch = FixtureFetch::new().with_page(&item_url(9), "  ");
        let hn = client(fetch);
        assert!(hn.fetch_item(9, StoryList::Top).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_is_deterministic() {
        let fetch = FixtureFetch::new()
            .with_page(&format!("{BASE}/topstories.json"), "[1]")
            .with_page(&item_url(1), r#"{"type":"story","title":"t","time":5}"#);
        let hn = client(fetch);
        assert_eq!(hn.top_stories(1).await, hn.top_stories(1).await);
    }
}
