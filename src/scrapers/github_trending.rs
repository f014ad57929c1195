//! GitHub Trending listing scraper.
//!
//! The trending page is a server-rendered list of `article.Box-row`
//! containers, one per repository. Each row is parsed independently: a row
//! without a heading link is skipped, a row that fails to parse is logged and
//! skipped, and neither affects its siblings.
//!
//! # URL Pattern
//!
//! `{base_url}/{language}?since={period}`; an empty language lists all
//! languages.

use crate::config::TrendingConfig;
use crate::http::Fetch;
use crate::models::{Metrics, NormalizedRecord, RepoMetrics, TrendingByLanguage};
use crate::utils::{collapse_whitespace, format_iso, normalize_count};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static ROW: Lazy<Selector> = Lazy::new(|| selector("article.Box-row"));
static HEADING_LINK: Lazy<Selector> = Lazy::new(|| selector("h2.h3 a"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("p.col-9"));
static LANGUAGE: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[itemprop="programmingLanguage"]"#));
static STAR_ICON: Lazy<Selector> = Lazy::new(|| selector("svg.octicon-star"));
static FORK_ICON: Lazy<Selector> = Lazy::new(|| selector("svg.octicon-repo-forked"));
static STARS_TODAY: Lazy<Selector> =
    Lazy::new(|| selector("span.d-inline-block.float-sm-right"));
static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+").expect("valid count regex"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid trending selector")
}

/// Label used for the "all languages" query.
pub const ALL_LANGUAGES: &str = "all";

/// Trending time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scraper for the trending listing of one host.
#[derive(Debug)]
pub struct GithubTrending<F> {
    fetch: F,
    base_url: String,
    site_url: String,
    captured_at: DateTime<Local>,
}

impl<F: Fetch> GithubTrending<F> {
    pub fn new(fetch: F, config: &TrendingConfig, captured_at: DateTime<Local>) -> Self {
        Self {
            fetch,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            site_url: config.site_url.clone(),
            captured_at,
        }
    }

    /// Listing URL for a language filter and period.
    pub fn listing_url(&self, language: &str, period: Period) -> String {
        format!(
            "{}/{}?since={}",
            self.base_url,
            urlencoding::encode(language),
            period
        )
    }

    /// Fetch and parse one listing page.
    ///
    /// # Arguments
    ///
    /// * `language` - Language path segment; empty for the all-languages listing
    /// * `period` - Trending window
    /// * `max_items` - Upper bound on rows read from the page
    ///
    /// # Returns
    ///
    /// Repository records in page order. A failed listing fetch is logged and
    /// yields an empty list.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(
        &self,
        language: &str,
        period: Period,
        max_items: usize,
    ) -> Vec<NormalizedRecord> {
        let url = self.listing_url(language, period);
        let html = match self.fetch.get_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, %url, "Trending listing fetch failed");
                return Vec::new();
            }
        };

        let repos = self.parse_listing(&html, language, max_items);
        info!(
            count = repos.len(),
            language = %label_for(language),
            "Scraped trending repositories"
        );
        repos
    }

    /// Fetch several languages in order; pacing happens in the transport.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_many(
        &self,
        languages: &[String],
        period: Period,
        max_items: usize,
    ) -> TrendingByLanguage {
        let mut result = TrendingByLanguage::new();
        for language in languages {
            let repos = self.fetch(language, period, max_items).await;
            result.insert(label_for(language), repos);
        }
        result
    }

    /// Parse a listing document into records, in document order.
    pub fn parse_listing(
        &self,
        html: &str,
        language: &str,
        max_items: usize,
    ) -> Vec<NormalizedRecord> {
        let site = match Url::parse(&self.site_url) {
            Ok(site) => site,
            Err(e) => {
                error!(error = %e, site_url = %self.site_url, "Invalid trending site URL");
                return Vec::new();
            }
        };
        let document = Html::parse_document(html);
        let timestamp = format_iso(&self.captured_at);
        let source_label = label_for(language);

        let mut repos = Vec::new();
        for (index, row) in document.select(&ROW).take(max_items).enumerate() {
            match parse_row(row, &site) {
                Ok(Some((url, metrics))) => repos.push(NormalizedRecord {
                    title: metrics.name.clone(),
                    url,
                    source_label: source_label.clone(),
                    timestamp: timestamp.clone(),
                    metrics: Metrics::Repo(metrics),
                }),
                Ok(None) => debug!(index, "Row has no repository link; skipping"),
                Err(e) => warn!(index, error = %e, "Failed to parse trending row; skipping"),
            }
        }
        repos
    }
}

fn label_for(language: &str) -> String {
    if language.is_empty() {
        ALL_LANGUAGES.to_string()
    } else {
        language.to_string()
    }
}

/// Parse a single row into its absolute link and metrics.
///
/// `Ok(None)` means the row has no repository link.
fn parse_row(
    row: ElementRef<'_>,
    site: &Url,
) -> Result<Option<(String, RepoMetrics)>, Box<dyn Error>> {
    let Some(link) = row.select(&HEADING_LINK).next() else {
        return Ok(None);
    };
    let href = link.value().attr("href").unwrap_or_default().trim();
    let name = href.trim_matches('/');
    if name.is_empty() {
        return Ok(None);
    }
    let url = site.join(href)?.to_string();

    let description = row
        .select(&DESCRIPTION)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let language = row
        .select(&LANGUAGE)
        .next()
        .map(element_text)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let stars_today = row
        .select(&STARS_TODAY)
        .next()
        .map(element_text)
        .and_then(|text| COUNT.find(&text).map(|m| normalize_count(m.as_str())))
        .unwrap_or_else(|| "0".to_string());

    let metrics = RepoMetrics {
        name: name.to_string(),
        description,
        language,
        stars: badge_count(row, &STAR_ICON),
        forks: badge_count(row, &FORK_ICON),
        stars_today,
    };
    Ok(Some((url, metrics)))
}

/// Read the counter next to the first `icon` whose parent carries a number.
///
/// Icons inside the stars-today badge belong to that badge, not the totals.
fn badge_count(row: ElementRef<'_>, icon: &Selector) -> String {
    row.select(icon)
        .filter(|svg| !in_stars_today(*svg))
        .filter_map(|svg| svg.parent().and_then(ElementRef::wrap))
        .map(element_text)
        .find(|text| text.chars().any(|c| c.is_ascii_digit()))
        .map(|text| normalize_count(&text))
        .unwrap_or_else(|| "0".to_string())
}

fn in_stars_today(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| STARS_TODAY.matches(&ancestor))
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}
