//! Fans one category out into many local-search sub-queries.
//!
//! Local search returns at most five hits per query, so each category carries
//! a table of phrases. Every phrase is searched by popularity, and the first
//! few are also searched in random order for variety. Hits are deduplicated,
//! parsed into candidates and sorted by distance.

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::error::{AppError, AppResult};
use crate::models::{map_search_url, Candidate, Category, GeoPoint, LocalSearchItem, SearchSort};
use crate::services::providers::LocalSearchProvider;

/// Upstream ceiling per local search call
pub const RESULTS_PER_QUERY: u32 = 5;

/// Phrases (from the top of each table) also searched with random sort
pub const RANDOM_SORT_PHRASES: usize = 3;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html tag regex"));

static PLACE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"place/(\d+)").expect("valid place id regex"));

pub struct QueryExpander {
    provider: Arc<dyn LocalSearchProvider>,
    concurrency: usize,
}

impl QueryExpander {
    pub fn new(provider: Arc<dyn LocalSearchProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs every sub-query for `category` and returns unscored, unenriched
    /// candidates.
    ///
    /// Failed sub-queries are skipped. Only when every one fails is the last
    /// error returned.
    pub async fn expand(
        &self,
        area_label: Option<&str>,
        category: Category,
        origin: Option<GeoPoint>,
    ) -> AppResult<Vec<Candidate>> {
        let queries = sub_queries(area_label, category);

        // Collected up front: a lazy map here leaves the future non-Send
        let calls: Vec<_> = queries
            .iter()
            .map(|(query, sort)| self.provider.search_local(query, *sort, RESULTS_PER_QUERY))
            .collect();

        let results: Vec<AppResult<Vec<LocalSearchItem>>> = stream::iter(calls)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut items = Vec::new();
        let mut last_error: Option<AppError> = None;
        let mut failed = 0usize;

        for ((query, sort), result) in queries.iter().zip(results) {
            match result {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        query = %query,
                        sort = sort.as_str(),
                        "Sub-query failed"
                    );
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if failed == queries.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let mut candidates = to_candidates(dedup_items(items), origin);
        sort_by_distance(&mut candidates);

        tracing::debug!(
            category = %category,
            queries = queries.len(),
            failed,
            candidates = candidates.len(),
            "Category expanded"
        );

        Ok(candidates)
    }
}

/// `(query text, sort)` pairs in issue order
fn sub_queries(area_label: Option<&str>, category: Category) -> Vec<(String, SearchSort)> {
    let mut queries = Vec::new();

    for (i, phrase) in category.sub_queries().iter().enumerate() {
        let query = match area_label {
            Some(area) => format!("{} {}", area, phrase),
            None => phrase.to_string(),
        };

        if i < RANDOM_SORT_PHRASES {
            queries.push((query.clone(), SearchSort::Random));
        }
        queries.push((query, SearchSort::Popular));
    }

    queries
}

pub fn strip_html(text: &str) -> String {
    HTML_TAG.replace_all(text, "").trim().to_string()
}

/// Numeric place id from a result link, if the link carries one
pub fn extract_place_id(link: &str) -> Option<String> {
    PLACE_ID
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Stable key for results without a place id: the same venue always maps to
/// the same id across searches.
pub fn synthetic_id(name: &str, address: &str) -> String {
    format!("naver_{}_{}", name, address)
}

/// Keeps the first hit per (name, address)
fn dedup_items(items: Vec<LocalSearchItem>) -> Vec<LocalSearchItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((strip_html(&item.title), item.address.clone())))
        .collect()
}

fn to_candidates(items: Vec<LocalSearchItem>, origin: Option<GeoPoint>) -> Vec<Candidate> {
    items
        .into_iter()
        .filter_map(|item| {
            let candidate = parse_item(item, origin);
            if candidate.is_none() {
                tracing::debug!("Dropping local search hit with malformed coordinates");
            }
            candidate
        })
        .collect()
}

/// Converts a raw hit. Returns `None` when its coordinates do not parse.
pub fn parse_item(item: LocalSearchItem, origin: Option<GeoPoint>) -> Option<Candidate> {
    let location = GeoPoint::from_naver(&item.mapx, &item.mapy)?;
    let name = strip_html(&item.title);

    let id = extract_place_id(&item.link).unwrap_or_else(|| synthetic_id(&name, &item.address));
    let place_url = if item.link.is_empty() {
        map_search_url(&name)
    } else {
        item.link
    };

    let mut candidate = Candidate {
        id,
        name,
        category: item.category,
        address: item.address,
        road_address: item.road_address,
        phone: item.telephone,
        latitude: location.lat,
        longitude: location.lng,
        distance_meters: None,
        rating: 0.0,
        review_count: 0,
        blog_review_count: 0,
        image_url: None,
        place_url,
        curation_score: None,
    };
    candidate.set_origin(origin);
    Some(candidate)
}

/// Ascending distance; candidates without one keep their order at the end
pub fn sort_by_distance(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| match (a.distance_meters, b.distance_meters) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
