use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::JwksConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySourceError {
    #[error("failed to fetch key set from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("key set endpoint {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode key set from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("key set fetch from {0} is cooling down after a failure")]
    CoolingDown(String),

    #[error("no key set available for {0}")]
    NotFound(String),

    #[error("http client setup failed: {0}")]
    Client(String),
}

/// Supplies JSON Web Key Sets by URL.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// The key set published at `url`. `force_refresh` asks for a fresh copy,
    /// which a source may still serve from cache to bound fetch rates.
    async fn key_set(&self, url: &str, force_refresh: bool) -> Result<Arc<JwkSet>, KeySourceError>;
}

struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Fetches key sets over HTTP and caches them per URL.
///
/// Cached sets are served until `ttl` elapses. A forced refresh hits the
/// network at most once per `min_refresh`, and a failed fetch blocks further
/// attempts for the same interval. A failed refresh leaves the cached set in
/// place; keys past `ttl` are never served. Concurrent misses for one URL
/// share a single fetch.
pub struct HttpKeySetSource {
    client: reqwest::Client,
    cache: DashMap<String, CachedKeySet>,
    failures: DashMap<String, Instant>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    ttl: Duration,
    min_refresh: Duration,
}

impl HttpKeySetSource {
    pub fn new(
        ttl: Duration,
        min_refresh: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, KeySourceError> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| KeySourceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            cache: DashMap::new(),
            failures: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
            min_refresh,
        })
    }

    pub fn from_config(config: &JwksConfig) -> Result<Self, KeySourceError> {
        Self::new(
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_secs(config.min_refresh_secs),
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    fn cached(&self, url: &str, force_refresh: bool) -> Option<Arc<JwkSet>> {
        let entry = self.cache.get(url)?;
        let age = entry.fetched_at.elapsed();

        if age >= self.ttl {
            return None;
        }
        if force_refresh && age >= self.min_refresh {
            return None;
        }

        Some(entry.keys.clone())
    }

    fn cooling_down(&self, url: &str) -> bool {
        self.failures
            .get(url)
            .is_some_and(|failed_at| failed_at.elapsed() < self.min_refresh)
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, KeySourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeySourceError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySourceError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn key_set(&self, url: &str, force_refresh: bool) -> Result<Arc<JwkSet>, KeySourceError> {
        if let Some(keys) = self.cached(url, force_refresh) {
            return Ok(keys);
        }

        if self.cooling_down(url) {
            return Err(KeySourceError::CoolingDown(url.to_string()));
        }

        let gate = self.in_flight.entry(url.to_string()).or_default().clone();
        let _fetching = gate.lock().await;

        // Another caller may have fetched or failed while this one waited.
        if let Some(keys) = self.cached(url, force_refresh) {
            return Ok(keys);
        }
        if self.cooling_down(url) {
            return Err(KeySourceError::CoolingDown(url.to_string()));
        }

        match self.fetch(url).await {
            Ok(set) => {
                tracing::info!(url, keys = set.keys.len(), "Fetched key set");
                let keys = Arc::new(set);
                self.failures.remove(url);
                self.cache.insert(
                    url.to_string(),
                    CachedKeySet {
                        keys: keys.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(keys)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Key set fetch failed");
                self.failures.insert(url.to_string(), Instant::now());
                Err(e)
            }
        }
    }
}

/// Key sets supplied up front. Counts lookups so callers can assert whether a
/// fetch happened.
#[derive(Default)]
pub struct StaticKeySetSource {
    sets: HashMap<String, Arc<JwkSet>>,
    fetches: AtomicUsize,
}

impl StaticKeySetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, set: JwkSet) -> Self {
        self.sets.insert(url.into(), Arc::new(set));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn key_set(&self, url: &str, _force_refresh: bool) -> Result<Arc<JwkSet>, KeySourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.sets
            .get(url)
            .cloned()
            .ok_or_else(|| KeySourceError::NotFound(url.to_string()))
    }
}
