use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Candidate, Radius, SearchQuery, SearchRequest, SearchResponse, Suggestions},
    routes::AppState,
    services::scoring,
};

/// Handler for restaurant search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<SearchResponse>> {
    let Json(request) = payload?;
    let query = request.validate()?;

    tracing::info!(
        request_id = %request_id,
        categories = query.categories.len(),
        excluded = query.exclude_ids.len(),
        quality_filter = query.quality_filter,
        "Processing search request"
    );

    let candidates = state.discovery.search(&query).await;
    let response = build_search_response(candidates, &query);

    tracing::info!(
        request_id = %request_id,
        total = response.total,
        filtered = response.filtered_count,
        "Search completed"
    );

    Ok(Json(response))
}

/// Handler for a single cached restaurant
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<Json<Candidate>> {
    tracing::debug!(request_id = %request_id, id = %id, "Looking up cached restaurant");

    let candidate = state
        .discovery
        .find_cached(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Restaurant {} not found", id)))?;

    let mut scored = scoring::score_candidates(vec![candidate]);
    scored
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal("Scoring dropped a candidate".to_string()))
}

/// Scores and ranks discovery results, attaching hints when nothing is left.
pub fn build_search_response(candidates: Vec<Candidate>, query: &SearchQuery) -> SearchResponse {
    let (restaurants, filtered_count) = scoring::rank(candidates, query.quality_filter);
    let suggestions = restaurants
        .is_empty()
        .then(|| suggestions_for(query, filtered_count));

    SearchResponse {
        total: restaurants.len(),
        restaurants,
        filtered_count,
        suggestions,
    }
}

fn suggestions_for(query: &SearchQuery, filtered_count: usize) -> Suggestions {
    let relax_quality_filter = query.quality_filter && filtered_count > 0;
    let expand_radius = query.radius != Radius::Wide;

    let message = if relax_quality_filter {
        "No restaurants passed the quality filter. Try turning it off."
    } else if expand_radius {
        "No restaurants found. Try expanding the search radius."
    } else {
        "No restaurants found nearby. Try other categories."
    };

    Suggestions {
        expand_radius,
        relax_quality_filter,
        message: message.to_string(),
    }
}
