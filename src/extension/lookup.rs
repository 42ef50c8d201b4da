//! Pronoun lookups against the PronounDB API.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::{models::Pronouns, routes::lookup::LookupResponse};

/// Resolves the pronouns registered for a platform account.
#[async_trait]
pub trait PronounLookup: Send + Sync {
    /// `Unspecified` when nothing is registered or the lookup failed.
    async fn fetch_pronouns(&self, platform: &str, id: &str) -> Pronouns;
}

/// Answers kept per page by default.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// HTTP client for `GET /api/v1/lookup`.
///
/// Successful answers are cached, least recently used first out. A failed
/// lookup is not cached.
#[derive(Debug)]
pub struct ApiLookup {
    http: reqwest::Client,
    base_url: String,
    cache: Mutex<LruCache<(String, String), Pronouns>>,
}

impl ApiLookup {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self::with_capacity(http, base_url, capacity)
    }

    pub fn with_capacity(
        http: reqwest::Client,
        base_url: impl Into<String>,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lookup_url(&self) -> String {
        format!("{}/api/v1/lookup", self.base_url.trim_end_matches('/'))
    }

    async fn request(&self, platform: &str, id: &str) -> anyhow::Result<Pronouns> {
        let response = self
            .http
            .get(self.lookup_url())
            .query(&[("platform", platform), ("id", id)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("lookup failed with status {}", response.status());
        }

        Ok(response.json::<LookupResponse>().await?.pronouns)
    }
}

#[async_trait]
impl PronounLookup for ApiLookup {
    async fn fetch_pronouns(&self, platform: &str, id: &str) -> Pronouns {
        let key = (platform.to_string(), id.to_string());
        let cached = self.cache.lock().get(&key).copied();
        if let Some(pronouns) = cached {
            return pronouns;
        }

        match self.request(platform, id).await {
            Ok(pronouns) => {
                self.cache.lock().put(key, pronouns);
                pronouns
            }
            Err(e) => {
                tracing::warn!("Pronoun lookup for {}:{} failed: {}", platform, id, e);
                Pronouns::Unspecified
            }
        }
    }
}
