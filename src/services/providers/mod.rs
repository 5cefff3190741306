/// External search capabilities
///
/// The discovery pipeline only talks to these traits. `NaverClient` implements
/// the three search capabilities over the Naver Open API, `NaverPlaceClient`
/// implements venue-detail lookups, and `CachedProvider` wraps any of them
/// with a Redis response cache and a daily call quota.
use crate::{
    error::AppResult,
    models::{ImageItem, LocalSearchItem, PlaceDetail, SearchSort},
};

pub mod cached;
pub mod naver;
pub mod naver_place;

pub use cached::CachedProvider;
pub use naver::NaverClient;
pub use naver_place::NaverPlaceClient;

/// Local (place) search
///
/// The upstream API caps `display` at 5 results per query, which is why
/// categories are expanded into many sub-queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LocalSearchProvider: Send + Sync {
    async fn search_local(
        &self,
        query: &str,
        sort: SearchSort,
        display: u32,
    ) -> AppResult<Vec<LocalSearchItem>>;
}

/// Image search. Callers only consult the first item.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageSearchProvider: Send + Sync {
    async fn search_images(&self, query: &str) -> AppResult<Vec<ImageItem>>;
}

/// Popularity signal for a free-text query (blog-post hit count)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PopularityProvider: Send + Sync {
    async fn popularity(&self, query: &str) -> AppResult<u32>;
}

/// Venue detail lookup by place id. `Ok(None)` means the venue is unknown.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaceDetailProvider: Send + Sync {
    async fn place_detail(&self, place_id: &str) -> AppResult<Option<PlaceDetail>>;
}
