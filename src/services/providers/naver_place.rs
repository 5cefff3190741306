/// Naver map place-summary provider
///
/// Returns real visitor ratings and review counts for a place id, which the
/// search APIs do not expose. Synthetic ids (no upstream place) short-circuit
/// to `None` without a request.
use crate::{
    error::{AppError, AppResult},
    models::{PlaceDetail, PlaceSummaryResponse},
    services::providers::PlaceDetailProvider,
};
use reqwest::{Client as HttpClient, StatusCode};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct NaverPlaceClient {
    http_client: HttpClient,
    api_url: String,
}

impl NaverPlaceClient {
    pub fn new(api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl PlaceDetailProvider for NaverPlaceClient {
    async fn place_detail(&self, place_id: &str) -> AppResult<Option<PlaceDetail>> {
        if place_id.is_empty() || !place_id.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        let url = format!("{}/v5/api/sites/summary/{}", self.api_url, place_id);

        let response = self
            .http_client
            .get(&url)
            .header("Referer", "https://map.naver.com/")
            .query(&[("lang", "ko")])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::RateLimited(
                    "Naver place API rate limit exceeded".to_string(),
                ))
            }
            status if !status.is_success() => {
                return Err(AppError::ExternalApi(format!(
                    "Naver place API returned status {}",
                    status
                )))
            }
            _ => {}
        }

        let summary: PlaceSummaryResponse = response.json().await.map_err(|e| {
            AppError::ExternalApi(format!("Failed to parse place summary: {}", e))
        })?;

        Ok(Some(summary.into_detail(place_id)))
    }
}
