//! HTTP transport used by every source adapter.
//!
//! The module uses a trait-based design so adapters never talk to `reqwest`
//! directly:
//! - [`Fetch`]: core trait, "GET this URL and give me the body"
//! - [`HttpFetcher`]: `reqwest` implementation with a fixed header set and a
//!   per-request timeout
//! - [`Paced`]: decorator that routes every request through a [`Pacer`]
//!
//! Tests substitute an in-memory [`Fetch`] holding fixture bodies.

use crate::pacer::{Pacer, PacingPolicy};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Browser User-Agent; some listing hosts reject default or empty agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Trait for fetching a remote document as text.
///
/// A non-2xx status, timeout, or connection error is an `Err`.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        (**self).get_text(url).await
    }
}

/// `reqwest`-backed [`Fetch`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the browser header set and a connect+read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = async {
            let resp = self.client.get(url).send().await?.error_for_status()?;
            Ok::<_, reqwest::Error>(resp.text().await?)
        }
        .await;
        let dt = t0.elapsed();

        match res {
            Ok(body) => {
                debug!(elapsed_ms = dt.as_millis() as u64, bytes = body.len(), "GET ok");
                Ok(body)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "GET failed");
                Err(Box::new(e))
            }
        }
    }
}

/// Decorator that paces every request of the wrapped [`Fetch`] per origin.
pub struct Paced<T> {
    inner: T,
    pacer: Pacer,
}

impl<T> Paced<T> {
    pub fn new(inner: T, policy: PacingPolicy) -> Self {
        Self {
            inner,
            pacer: Pacer::new(policy),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Paced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paced").field("pacer", &self.pacer).finish()
    }
}

impl<T: Fetch> Fetch for Paced<T> {
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let _permit = self.pacer.acquire(url).await?;
        self.inner.get_text(url).await
    }
}
