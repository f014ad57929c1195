//! Per-origin request pacing.
//!
//! A [`Pacer`] keeps one gate per origin (`scheme://host:port`). Each gate
//! bounds how many requests to that origin may be in flight at once and how
//! close together two request starts may be. Requests to different origins
//! never wait on each other.
//!
//! # Spacing
//!
//! ```text
//! next_start = max(now, previous_start + interval + jitter(0..=jitter_ms))
//! ```

use rand::{Rng, rng};
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument};
use url::Url;

/// Pacing settings for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PacingPolicy {
    /// Minimum delay between two request starts on one origin.
    pub interval_ms: u64,
    /// Requests allowed in flight per origin.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Upper bound of random delay added on top of `interval_ms`.
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_max_concurrency() -> usize {
    1
}

impl PacingPolicy {
    /// One request at a time, at least `interval_ms` apart.
    pub fn sequential(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            max_concurrency: 1,
            jitter_ms: 0,
        }
    }

    /// No spacing at all; used by tests.
    pub fn unpaced() -> Self {
        Self::sequential(0)
    }

    fn spacing(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.interval_ms + jitter)
    }
}

struct Gate {
    permits: Arc<Semaphore>,
    next_slot: AsyncMutex<Option<Instant>>,
}

/// Per-origin pacing gates sharing one [`PacingPolicy`].
pub struct Pacer {
    policy: PacingPolicy,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer").field("policy", &self.policy).finish()
    }
}

/// Held for the duration of one request; releases the origin's concurrency
/// slot when dropped.
pub struct PacerPermit {
    _permit: OwnedSemaphorePermit,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `url` may start.
    ///
    /// # Errors
    ///
    /// Returns an error if the gate table lock is poisoned or the origin's
    /// semaphore was closed.
    #[instrument(level = "debug", skip(self))]
    pub async fn acquire(&self, url: &str) -> Result<PacerPermit, Box<dyn Error>> {
        let origin = origin_of(url);
        let gate = self.gate_for(&origin)?;

        let permit = Arc::clone(&gate.permits).acquire_owned().await?;

        {
            let mut next_slot = gate.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => {
                    debug!(%origin, wait_ms = (slot - now).as_millis() as u64, "Pacing request");
                    sleep_until(slot).await;
                    slot
                }
                _ => now,
            };
            *next_slot = Some(start + self.policy.spacing());
        }

        Ok(PacerPermit { _permit: permit })
    }

    fn gate_for(&self, origin: &str) -> Result<Arc<Gate>, Box<dyn Error>> {
        let mut gates = self
            .gates
            .lock()
            .map_err(|e| format!("pacer gate table poisoned: {e}"))?;
        let gate = gates.entry(origin.to_string()).or_insert_with(|| {
            Arc::new(Gate {
                permits: Arc::new(Semaphore::new(self.policy.max_concurrency.max(1))),
                next_slot: AsyncMutex::new(None),
            })
        });
        Ok(Arc::clone(gate))
    }
}

/// Origin key of a URL, `scheme://host:port`. Unparseable input is its own key.
pub fn origin_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://hacker-news.firebaseio.com/v0/item/1.json"),
            "https://hacker-news.firebaseio.com"
        );
        assert_eq!(origin_of("http://localhost:8080/a?b=c"), "http://localhost:8080");
        assert_eq!(origin_of("not a url"), "not a url");
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_origin_requests_are_spaced() {
        let pacer = Pacer::new(PacingPolicy::sequential(2_000));
        let t0 = Instant::now();

        drop(pacer.acquire("https://github.com/trending/python").await.unwrap());
        assert_eq!(t0.elapsed(), Duration::ZERO);

        drop(pacer.acquire("https://github.com/trending/go").await.unwrap());
        assert_eq!(t0.elapsed(), Duration::from_millis(2_000));

        drop(pacer.acquire("https://github.com/trending/rust").await.unwrap());
        assert_eq!(t0.elapsed(), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_origins_do_not_wait_on_each_other() {
        let pacer = Pacer::new(PacingPolicy::sequential(1_000));
        let t0 = Instant::now();

        let _a = pacer.acquire("https://techcrunch.com/feed/").await.unwrap();
        let _b = pacer.acquire("https://www.wired.com/feed/rss").await.unwrap();
        let _c = pacer.acquire("https://sspai.com/feed").await.unwrap();
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_keep_minimum_spacing() {
        let pacer = Pacer::new(PacingPolicy {
            interval_ms: 100,
            max_concurrency: 4,
            jitter_ms: 0,
        });
        let t0 = Instant::now();

        let starts = join_all((0..4).map(|i| {
            let pacer = &pacer;
            async move {
                let _permit = pacer
                    .acquire(&format!("https://hacker-news.firebaseio.com/v0/item/{i}.json"))
                    .await
                    .unwrap();
                t0.elapsed()
            }
        }))
        .await;

        let mut starts = starts;
        starts.sort();
        assert_eq!(
            starts,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling_blocks_until_permit_dropped() {
        let pacer = Pacer::new(PacingPolicy::unpaced());
        let first = pacer.acquire("https://github.com/a").await.unwrap();

        let second = tokio::time::timeout(
            Duration::from_secs(5),
            pacer.acquire("https://github.com/b"),
        )
        .await;
        assert!(second.is_err(), "second request must wait for the first permit");

        drop(first);
        assert!(pacer.acquire("https://github.com/b").await.is_ok());
    }
}
