use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{Candidate, PickResponse, RetryRequest, SearchRequest, Weighting},
    routes::AppState,
    services::{scoring, selector},
};

const NOTHING_ELIGIBLE: &str = "No restaurant found. Try expanding the search radius.";

/// Handler for a fresh weighted pick: search, score, then select
pub async fn pick(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<PickResponse>> {
    let Json(request) = payload?;
    let query = request.validate()?;

    tracing::info!(
        request_id = %request_id,
        categories = query.categories.len(),
        excluded = query.exclude_ids.len(),
        "Processing pick request"
    );

    let candidates = state.discovery.search(&query).await;
    let (ranked, _) = scoring::rank(candidates, query.quality_filter);
    let response = select(&ranked, &query.exclude_ids, state.weighting);

    log_outcome(&request_id, &response);
    Ok(Json(response))
}

/// Handler for re-picking from candidates the client already holds
pub async fn retry(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<RetryRequest>, JsonRejection>,
) -> AppResult<Json<PickResponse>> {
    let Json(request) = payload?;

    tracing::info!(
        request_id = %request_id,
        candidates = request.candidates.len(),
        excluded = request.exclude_ids.len(),
        "Processing pick retry"
    );

    // Client-supplied scores are not trusted
    let scored = scoring::score_candidates(request.candidates);
    let response = select(&scored, &request.exclude_ids, state.weighting);

    log_outcome(&request_id, &response);
    Ok(Json(response))
}

fn select(candidates: &[Candidate], exclude_ids: &[String], weighting: Weighting) -> PickResponse {
    let outcome = selector::pick(candidates, exclude_ids, weighting, &mut rand::rng());

    match outcome {
        Some(result) => PickResponse {
            picked: Some(result.picked),
            alternatives: result.alternatives,
            timestamp: Utc::now(),
            message: None,
        },
        None => PickResponse {
            picked: None,
            alternatives: Vec::new(),
            timestamp: Utc::now(),
            message: Some(NOTHING_ELIGIBLE.to_string()),
        },
    }
}

fn log_outcome(request_id: &RequestId, response: &PickResponse) {
    match &response.picked {
        Some(picked) => tracing::info!(
            request_id = %request_id,
            picked = %picked.id,
            score = picked.curation_score.unwrap_or(0),
            alternatives = response.alternatives.len(),
            "Pick completed"
        ),
        None => tracing::info!(request_id = %request_id, "No eligible candidate to pick"),
    }
}
