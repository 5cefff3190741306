//! Best-effort enrichment of search candidates.
//!
//! Local search hits carry no rating, review count or image. For the closest
//! `budget` candidates this fills them in from up to three strategies: an
//! optional venue-detail lookup, an image search and a blog-popularity count.
//! A field is only written while it still holds its default, so whichever
//! strategy ran first and found a real value keeps it.

use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Candidate, PlaceDetail};
use crate::services::providers::{ImageSearchProvider, PlaceDetailProvider, PopularityProvider};
use crate::services::query_expander::sort_by_distance;

/// Blog-hit thresholds and the rating each one implies, highest first
const RATING_BUCKETS: [(u32, f64); 6] = [
    (1000, 4.5),
    (500, 4.3),
    (200, 4.1),
    (100, 3.9),
    (50, 3.7),
    (10, 3.5),
];

const REVIEW_ESTIMATE_MULTIPLIER: u32 = 3;
const MAX_BLOG_REVIEW_COUNT: u32 = 9999;

/// Rating implied by a blog hit count; 0.0 when too few posts exist.
pub fn estimate_rating(blog_count: u32) -> f64 {
    RATING_BUCKETS
        .iter()
        .find(|(threshold, _)| blog_count >= *threshold)
        .map(|(_, rating)| *rating)
        .unwrap_or(0.0)
}

pub fn blog_query(candidate: &Candidate) -> String {
    let address = if candidate.road_address.is_empty() {
        &candidate.address
    } else {
        &candidate.road_address
    };
    format!("{} {} 맛집 리뷰", candidate.name, address)
}

/// Second address token, e.g. "강남구" in "서울특별시 강남구 대치동 896-33"
fn district(candidate: &Candidate) -> Option<String> {
    let address = if candidate.address.is_empty() {
        &candidate.road_address
    } else {
        &candidate.address
    };
    address.split_whitespace().nth(1).map(str::to_string)
}

pub struct EnrichmentClient {
    image: Arc<dyn ImageSearchProvider>,
    popularity: Arc<dyn PopularityProvider>,
    detail: Option<Arc<dyn PlaceDetailProvider>>,
}

impl EnrichmentClient {
    pub fn new(image: Arc<dyn ImageSearchProvider>, popularity: Arc<dyn PopularityProvider>) -> Self {
        Self {
            image,
            popularity,
            detail: None,
        }
    }

    /// Adds a venue-detail lookup that runs before the search-based strategies
    pub fn with_place_detail(mut self, detail: Arc<dyn PlaceDetailProvider>) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Sorts by distance and enriches the first `budget` candidates, one at
    /// a time. The rest are returned untouched. Never fails.
    pub async fn enrich(&self, mut candidates: Vec<Candidate>, budget: usize) -> Vec<Candidate> {
        sort_by_distance(&mut candidates);

        let budget = budget.min(candidates.len());
        for candidate in candidates.iter_mut().take(budget) {
            self.enrich_one(candidate).await;
        }

        tracing::debug!(
            enriched = budget,
            total = candidates.len(),
            "Enrichment completed"
        );

        candidates
    }

    async fn enrich_one(&self, candidate: &mut Candidate) {
        if let Some(detail) = &self.detail {
            match detail.place_detail(&candidate.id).await {
                Ok(Some(found)) => apply_detail(candidate, found),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, id = %candidate.id, "Place detail lookup failed")
                }
            }
        }

        let name = candidate.name.clone();
        let district = district(candidate);
        let query = blog_query(candidate);
        let needs_image = candidate.image_url.is_none();

        let (image, popularity) = tokio::join!(
            async {
                if needs_image {
                    self.lookup_image(&name, district.as_deref()).await
                } else {
                    Ok(None)
                }
            },
            self.popularity.popularity(&query),
        );

        match image {
            Ok(Some(url)) if candidate.image_url.is_none() => candidate.image_url = Some(url),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, id = %candidate.id, "Image lookup failed"),
        }

        match popularity {
            Ok(count) => apply_popularity(candidate, count),
            Err(e) => tracing::warn!(error = %e, id = %candidate.id, "Popularity lookup failed"),
        }
    }

    /// First image for "<name> <district>", falling back to the bare name
    async fn lookup_image(&self, name: &str, district: Option<&str>) -> AppResult<Option<String>> {
        if let Some(district) = district {
            let items = self
                .image
                .search_images(&format!("{} {}", name, district))
                .await?;
            if let Some(first) = items.into_iter().find(|i| !i.link.is_empty()) {
                return Ok(Some(first.link));
            }
        }

        let items = self.image.search_images(name).await?;
        Ok(items
            .into_iter()
            .find(|i| !i.link.is_empty())
            .map(|i| i.link))
    }
}

fn apply_detail(candidate: &mut Candidate, detail: PlaceDetail) {
    if let Some(rating) = detail.rating {
        if candidate.rating == 0.0 {
            candidate.rating = rating;
        }
    }
    if let Some(count) = detail.review_count {
        if candidate.review_count == 0 {
            candidate.review_count = count;
        }
    }
    if let Some(count) = detail.blog_review_count {
        if candidate.blog_review_count == 0 {
            candidate.blog_review_count = count.min(MAX_BLOG_REVIEW_COUNT);
        }
    }
    if candidate.image_url.is_none() {
        candidate.image_url = detail.image_url;
    }
}

fn apply_popularity(candidate: &mut Candidate, count: u32) {
    if candidate.rating == 0.0 {
        candidate.rating = estimate_rating(count);
    }
    if candidate.review_count == 0 {
        candidate.review_count = count.saturating_mul(REVIEW_ESTIMATE_MULTIPLIER);
    }
    if candidate.blog_review_count == 0 {
        candidate.blog_review_count = count.min(MAX_BLOG_REVIEW_COUNT);
    }
}
