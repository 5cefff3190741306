//! Top-level search pipeline: geo cache, then expansion and enrichment on a
//! miss, merged across categories.

use std::collections::HashSet;

use crate::db::GeoCache;
use crate::error::AppResult;
use crate::models::{Candidate, Category, SearchQuery};
use crate::services::enrichment::EnrichmentClient;
use crate::services::query_expander::{sort_by_distance, QueryExpander};

pub struct DiscoveryOrchestrator {
    geo_cache: GeoCache,
    expander: QueryExpander,
    enricher: EnrichmentClient,
    /// Enrichment calls allowed per search, shared by all its categories
    enrich_limit: usize,
}

impl DiscoveryOrchestrator {
    pub fn new(
        geo_cache: GeoCache,
        expander: QueryExpander,
        enricher: EnrichmentClient,
        enrich_limit: usize,
    ) -> Self {
        Self {
            geo_cache,
            expander,
            enricher,
            enrich_limit,
        }
    }

    /// Unscored candidates for every requested category, deduplicated by id,
    /// without excluded ids, nearest first.
    ///
    /// A failing category is logged and contributes nothing.
    pub async fn search(&self, query: &SearchQuery) -> Vec<Candidate> {
        tracing::info!(
            lat = query.origin.lat,
            lng = query.origin.lng,
            radius = query.radius.meters(),
            categories = query.categories.len(),
            area = query.area_label.as_deref().unwrap_or(""),
            "Discovery started"
        );

        let mut merged: Vec<Candidate> = Vec::new();

        for &category in &query.categories {
            match self.search_category(query, category, &merged).await {
                Ok(found) => {
                    tracing::debug!(category = %category, found = found.len(), "Category searched");
                    merged.extend(found);
                }
                Err(e) => {
                    tracing::warn!(error = %e, category = %category, "Category search failed")
                }
            }
        }

        let excluded: HashSet<&str> = query.exclude_ids.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut results: Vec<Candidate> = merged
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .filter(|c| !excluded.contains(c.id.as_str()))
            .collect();
        sort_by_distance(&mut results);

        tracing::info!(results = results.len(), "Discovery completed");
        results
    }

    async fn search_category(
        &self,
        query: &SearchQuery,
        category: Category,
        merged: &[Candidate],
    ) -> AppResult<Vec<Candidate>> {
        let origin = query.origin;

        if let Some(ids) = self.geo_cache.lookup(origin, category).await {
            let cached = self.geo_cache.load_candidates(&ids, Some(origin)).await;
            if !cached.is_empty() {
                return Ok(cached);
            }
            tracing::debug!(category = %category, "Cached search has no stored rows, searching again");
        }

        let expanded = self
            .expander
            .expand(query.area_label.as_deref(), category, Some(origin))
            .await?;

        let enriched_so_far = merged.iter().filter(|c| c.is_enriched()).count();
        let budget = self.enrich_limit.saturating_sub(enriched_so_far);
        let enriched = self.enricher.enrich(expanded, budget).await;

        self.geo_cache
            .store(origin, category, query.area_label.as_deref(), &enriched);

        Ok(enriched)
    }

    /// A previously cached restaurant by id
    pub async fn find_cached(&self, id: &str) -> Option<Candidate> {
        self.geo_cache
            .load_candidates(&[id.to_string()], None)
            .await
            .into_iter()
            .next()
    }

    /// Waits for pending geo-cache writes
    pub async fn flush(&self) {
        self.geo_cache.flush().await;
    }
}
