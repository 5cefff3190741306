use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod category;
pub mod geo;

pub use category::Category;
pub use geo::GeoPoint;

const MAP_SEARCH_BASE: &str = "https://map.naver.com/v5/search";

// ============================================================================
// Curation Types
// ============================================================================

/// A restaurant surfaced by search, before or after enrichment and scoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Naver place id, or `naver_<name>_<address>` when the result carries none
    pub id: String,
    pub name: String,
    /// Free-text category label from the source (e.g. "한식>국밥")
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub road_address: String,
    #[serde(default)]
    pub phone: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the search origin; only set when an origin is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    /// 0.0 when unknown
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub blog_review_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub place_url: String,
    /// Derived by the score engine, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation_score: Option<u8>,
}

impl Candidate {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn signals(&self) -> ScoreSignals {
        ScoreSignals {
            rating: self.rating,
            review_count: self.review_count,
            blog_review_count: self.blog_review_count,
        }
    }

    /// A candidate counts as enriched once it carries a rating or an image.
    pub fn is_enriched(&self) -> bool {
        self.rating > 0.0 || self.image_url.is_some()
    }

    /// Recomputes `distance_meters` against `origin` (or clears it).
    pub fn set_origin(&mut self, origin: Option<GeoPoint>) {
        self.distance_meters = origin.map(|o| o.distance_meters(&self.location()));
    }
}

/// Raw signals the curation score is computed from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreSignals {
    pub rating: f64,
    pub review_count: u32,
    pub blog_review_count: u32,
}

/// Outcome of a weighted random pick
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectionResult {
    pub picked: Candidate,
    /// Up to three other eligible candidates, never containing `picked`
    pub alternatives: Vec<Candidate>,
}

/// How curation scores translate into selection weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// `max(1, score)`: pick probability proportional to the score
    #[default]
    Linear,
    /// `sqrt(max(1, score)) + 1`: flatter, high scores preferred but not dominant
    Sqrt,
}

impl Weighting {
    pub fn weight(&self, score: u8) -> f64 {
        let base = f64::from(score.max(1));
        match self {
            Weighting::Linear => base,
            Weighting::Sqrt => base.sqrt() + 1.0,
        }
    }
}

/// Allowed search radii in meters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radius {
    Near,
    Walk,
    Wide,
}

impl Radius {
    pub fn meters(&self) -> u32 {
        match self {
            Radius::Near => 500,
            Radius::Walk => 1000,
            Radius::Wide => 2000,
        }
    }
}

impl TryFrom<u32> for Radius {
    type Error = AppError;

    fn try_from(meters: u32) -> Result<Self, Self::Error> {
        match meters {
            500 => Ok(Radius::Near),
            1000 => Ok(Radius::Walk),
            2000 => Ok(Radius::Wide),
            other => Err(AppError::InvalidInput(format!(
                "Invalid radius {}: must be 500, 1000, or 2000",
                other
            ))),
        }
    }
}

/// Naver map search URL for a venue name, used when a result has no link
pub fn map_search_url(name: &str) -> String {
    reqwest::Url::parse(MAP_SEARCH_BASE)
        .map(|mut url| {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.push(name);
            }
            url.to_string()
        })
        .unwrap_or_else(|_| format!("{}/{}", MAP_SEARCH_BASE, name))
}

// ============================================================================
// Geo Cache Types
// ============================================================================

/// Persisted raw signals for one restaurant. Scores are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedRestaurant {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub road_address: Option<String>,
    pub phone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
    pub review_count: i32,
    pub blog_review_count: i32,
    pub image_url: Option<String>,
    pub place_url: Option<String>,
    pub is_enriched: bool,
    pub cached_at: DateTime<Utc>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl CachedRestaurant {
    pub fn from_candidate(candidate: &Candidate, cached_at: DateTime<Utc>) -> Self {
        Self {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            category: non_empty(&candidate.category),
            address: non_empty(&candidate.address),
            road_address: non_empty(&candidate.road_address),
            phone: non_empty(&candidate.phone),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            rating: candidate.rating,
            review_count: i32::try_from(candidate.review_count).unwrap_or(i32::MAX),
            blog_review_count: i32::try_from(candidate.blog_review_count).unwrap_or(i32::MAX),
            image_url: candidate.image_url.clone(),
            place_url: non_empty(&candidate.place_url),
            is_enriched: candidate.is_enriched(),
            cached_at,
        }
    }

    /// Rebuilds an unscored candidate, deriving distance from `origin`.
    pub fn into_candidate(self, origin: Option<GeoPoint>) -> Candidate {
        let place_url = self
            .place_url
            .unwrap_or_else(|| map_search_url(&self.name));
        let mut candidate = Candidate {
            id: self.id,
            name: self.name,
            category: self.category.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            road_address: self.road_address.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            latitude: self.latitude,
            longitude: self.longitude,
            distance_meters: None,
            rating: self.rating,
            review_count: u32::try_from(self.review_count).unwrap_or(0),
            blog_review_count: u32::try_from(self.blog_review_count).unwrap_or(0),
            image_url: self.image_url,
            place_url,
            curation_score: None,
        };
        candidate.set_origin(origin);
        candidate
    }
}

/// One completed search: where, for which category, and what it found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
    pub area_label: Option<String>,
    /// Candidate ids in result order
    pub result_ids: Vec<String>,
    pub cached_at: DateTime<Utc>,
}

impl SearchRecord {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// Naver Open API Types
// ============================================================================

/// Sort order accepted by the local search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchSort {
    /// Most discussed first (`comment`)
    Popular,
    /// Naver's randomized ordering (`random`)
    Random,
}

impl SearchSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::Popular => "comment",
            SearchSort::Random => "random",
        }
    }
}

/// Raw response from /v1/search/local.json
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSearchResponse {
    #[serde(default)]
    pub items: Vec<LocalSearchItem>,
}

/// One local search hit. `title` contains `<b>` highlight tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub telephone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub road_address: String,
    #[serde(default)]
    pub mapx: String,
    #[serde(default)]
    pub mapy: String,
}

/// Raw response from /v1/search/image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSearchResponse {
    #[serde(default)]
    pub items: Vec<ImageItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Raw response from /v1/search/blog.json; only the hit total is used
#[derive(Debug, Clone, Deserialize)]
pub struct BlogSearchResponse {
    #[serde(default)]
    pub total: u64,
}

/// Venue details from the map place-summary endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    pub id: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub blog_review_count: Option<u32>,
    pub image_url: Option<String>,
}

/// Raw place-summary payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSummaryResponse {
    #[serde(default)]
    pub visitor_review_score: Option<f64>,
    #[serde(default)]
    pub blog_cafe_review_score: Option<f64>,
    #[serde(default)]
    pub visitor_review_count: Option<u32>,
    #[serde(default)]
    pub blog_cafe_review_count: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thum_url: Option<String>,
}

impl PlaceSummaryResponse {
    pub fn into_detail(self, id: &str) -> PlaceDetail {
        PlaceDetail {
            id: id.to_string(),
            rating: self
                .visitor_review_score
                .or(self.blog_cafe_review_score)
                .filter(|r| *r > 0.0),
            review_count: self.visitor_review_count.filter(|c| *c > 0),
            blog_review_count: self.blog_cafe_review_count.filter(|c| *c > 0),
            image_url: self
                .image_url
                .or(self.thum_url)
                .filter(|u| !u.is_empty()),
        }
    }
}

// ============================================================================
// HTTP Request / Response Types
// ============================================================================

/// Body of the search and pick endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub lat: f64,
    pub lng: f64,
    pub radius: u32,
    pub categories: Vec<String>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    #[serde(default, alias = "areaName")]
    pub area_label: Option<String>,
    #[serde(default)]
    pub quality_filter: bool,
}

/// A validated search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub origin: GeoPoint,
    pub radius: Radius,
    pub categories: Vec<Category>,
    pub exclude_ids: Vec<String>,
    pub area_label: Option<String>,
    pub quality_filter: bool,
}

impl SearchRequest {
    /// Rejects bad coordinates, radii and category lists before any external call.
    pub fn validate(self) -> AppResult<SearchQuery> {
        let origin = GeoPoint::new(self.lat, self.lng);
        if !origin.is_valid() {
            return Err(AppError::InvalidInput(format!(
                "Invalid coordinates: ({}, {})",
                self.lat, self.lng
            )));
        }

        let radius = Radius::try_from(self.radius)?;

        if self.categories.is_empty() {
            return Err(AppError::InvalidInput(
                "Invalid categories: must be non-empty array".to_string(),
            ));
        }

        let mut categories = Vec::with_capacity(self.categories.len());
        for raw in &self.categories {
            let category: Category = raw.parse().map_err(AppError::InvalidInput)?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        let area_label = self
            .area_label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());

        Ok(SearchQuery {
            origin,
            radius,
            categories,
            exclude_ids: self.exclude_ids,
            area_label,
            quality_filter: self.quality_filter,
        })
    }
}

/// Hints returned when a search comes back empty or thin
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub expand_radius: bool,
    pub relax_quality_filter: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Scored candidates, best score first
    pub restaurants: Vec<Candidate>,
    pub total: usize,
    /// Number of candidates removed by the quality filter
    pub filtered_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

/// Pick result. `picked` is null when nothing was eligible.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickResponse {
    pub picked: Option<Candidate>,
    pub alternatives: Vec<Candidate>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Re-pick from a candidate set the client already holds
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
}
