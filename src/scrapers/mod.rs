//! Source adapters, one per remote source kind.
//!
//! Every adapter is generic over the [`crate::http::Fetch`] transport and
//! returns collections rather than errors: a failed call is logged and
//! contributes nothing, and one bad item never spoils its siblings.
//!
//! | Source | Module | Wire format | Records |
//! |--------|--------|-------------|---------|
//! | GitHub Trending | [`github_trending`] | HTML listing | repos, grouped by language |
//! | Hacker News | [`hackernews`] | JSON item API | stories, in ranking order |
//! | Tech feeds | [`rss_feeds`] | RSS 2.0 / Atom 1.0 ([`feed_xml`]) | articles, in registry order |

pub mod feed_xml;
pub mod github_trending;
pub mod hackernews;
pub mod rss_feeds;
