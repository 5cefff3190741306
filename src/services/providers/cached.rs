/// Redis-backed decorator for the Naver search providers
///
/// Wraps any provider with a read-through response cache and a shared daily
/// call quota. Only upstream calls count against the quota; cache hits are
/// free. When Redis is unreachable the decorator passes calls straight through.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{ImageItem, LocalSearchItem, SearchSort},
    services::providers::{ImageSearchProvider, LocalSearchProvider, PopularityProvider},
};
use chrono::Utc;

/// Image and blog lookups change slowly
const LOOKUP_CACHE_TTL: u64 = 86_400; // 24 hours
/// Usage counters outlive their day so late increments still land
const USAGE_KEY_TTL: i64 = 172_800; // 48 hours
const QUOTA_WARN_RATIO: f64 = 0.8;

pub struct CachedProvider<P> {
    inner: P,
    cache: Cache,
    daily_quota: u32,
    search_ttl: u64,
}

impl<P> CachedProvider<P> {
    pub fn new(inner: P, cache: Cache, daily_quota: u32, search_ttl: u64) -> Self {
        Self {
            inner,
            cache,
            daily_quota,
            search_ttl,
        }
    }

    fn usage_key() -> CacheKey {
        CacheKey::NaverUsage(Utc::now().format("%Y-%m-%d").to_string())
    }

    /// Claims one call from today's quota before going upstream. The decision
    /// rests on this call's own `INCR` result, never on a separate read.
    async fn reserve_call(&self) -> AppResult<()> {
        let used = match self
            .cache
            .increment_usage(&Self::usage_key(), USAGE_KEY_TTL)
            .await
        {
            Ok(used) => used,
            Err(e) => {
                tracing::warn!(error = %e, "Quota counter unavailable, allowing call");
                return Ok(());
            }
        };

        match quota_status(used, self.daily_quota) {
            QuotaStatus::Available => Ok(()),
            QuotaStatus::NearlySpent => {
                tracing::warn!(used, quota = self.daily_quota, "Naver daily quota 80% consumed");
                Ok(())
            }
            QuotaStatus::Exhausted => {
                tracing::warn!(used, quota = self.daily_quota, "Naver daily quota exhausted");
                Err(AppError::RateLimited(format!(
                    "Naver daily quota of {} calls exhausted",
                    self.daily_quota
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuotaStatus {
    Available,
    /// Exactly at the warning threshold, so the warning fires once a day
    NearlySpent,
    Exhausted,
}

/// Classifies a call given the counter value its own `INCR` returned.
fn quota_status(used: u32, daily_quota: u32) -> QuotaStatus {
    let warn_at = (f64::from(daily_quota) * QUOTA_WARN_RATIO).ceil() as u32;

    if used > daily_quota {
        QuotaStatus::Exhausted
    } else if used == warn_at {
        QuotaStatus::NearlySpent
    } else {
        QuotaStatus::Available
    }
}

#[async_trait::async_trait]
impl<P: LocalSearchProvider> LocalSearchProvider for CachedProvider<P> {
    async fn search_local(
        &self,
        query: &str,
        sort: SearchSort,
        display: u32,
    ) -> AppResult<Vec<LocalSearchItem>> {
        let key = CacheKey::LocalSearch {
            query: query.to_string(),
            sort,
        };

        cached!(self.cache, key, self.search_ttl, async {
            self.reserve_call().await?;
            self.inner.search_local(query, sort, display).await
        })
    }
}

#[async_trait::async_trait]
impl<P: ImageSearchProvider> ImageSearchProvider for CachedProvider<P> {
    async fn search_images(&self, query: &str) -> AppResult<Vec<ImageItem>> {
        cached!(
            self.cache,
            CacheKey::ImageSearch(query.to_string()),
            LOOKUP_CACHE_TTL,
            async {
                self.reserve_call().await?;
                self.inner.search_images(query).await
            }
        )
    }
}

#[async_trait::async_trait]
impl<P: PopularityProvider> PopularityProvider for CachedProvider<P> {
    async fn popularity(&self, query: &str) -> AppResult<u32> {
        cached!(
            self.cache,
            CacheKey::Popularity(query.to_string()),
            LOOKUP_CACHE_TTL,
            async {
                self.reserve_call().await?;
                self.inner.popularity(query).await
            }
        )
    }
}
