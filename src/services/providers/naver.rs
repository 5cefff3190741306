/// Naver Open API provider
///
/// One set of application credentials covers three search endpoints:
/// 1. Local search: /v1/search/local.json → place hits (max 5 per call)
/// 2. Image search: /v1/search/image → image links for a venue name
/// 3. Blog search: /v1/search/blog.json → hit total, used as a popularity signal
use crate::{
    error::{AppError, AppResult},
    models::{
        BlogSearchResponse, ImageItem, ImageSearchResponse, LocalSearchItem, LocalSearchResponse,
        SearchSort,
    },
    services::providers::{ImageSearchProvider, LocalSearchProvider, PopularityProvider},
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upstream ceiling on `display` for local search
pub const LOCAL_SEARCH_MAX_DISPLAY: u32 = 5;

const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct NaverClient {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    api_url: String,
}

impl NaverClient {
    pub fn new(client_id: String, client_secret: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            client_id,
            client_secret,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issues an authenticated GET and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(path = %path, "Naver API rate limit exceeded");
            return Err(AppError::RateLimited(
                "Naver API rate limit exceeded".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Naver API returned status {}: {}",
                status, body
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to deserialize Naver response");
            AppError::ExternalApi(format!("Failed to parse Naver response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl LocalSearchProvider for NaverClient {
    async fn search_local(
        &self,
        query: &str,
        sort: SearchSort,
        display: u32,
    ) -> AppResult<Vec<LocalSearchItem>> {
        let display = display.clamp(1, LOCAL_SEARCH_MAX_DISPLAY).to_string();

        let response: LocalSearchResponse = self
            .get_json(
                "/v1/search/local.json",
                &[
                    ("query", query),
                    ("display", display.as_str()),
                    ("start", "1"),
                    ("sort", sort.as_str()),
                ],
            )
            .await?;

        tracing::debug!(
            query = %query,
            sort = sort.as_str(),
            results = response.items.len(),
            "Local search completed"
        );

        Ok(response.items)
    }
}

#[async_trait::async_trait]
impl ImageSearchProvider for NaverClient {
    async fn search_images(&self, query: &str) -> AppResult<Vec<ImageItem>> {
        let response: ImageSearchResponse = self
            .get_json(
                "/v1/search/image",
                &[
                    ("query", query),
                    ("display", "1"),
                    ("sort", "sim"),
                    ("filter", "all"),
                ],
            )
            .await?;

        Ok(response.items)
    }
}

#[async_trait::async_trait]
impl PopularityProvider for NaverClient {
    async fn popularity(&self, query: &str) -> AppResult<u32> {
        let response: BlogSearchResponse = self
            .get_json(
                "/v1/search/blog.json",
                &[("query", query), ("display", "1"), ("sort", "sim")],
            )
            .await?;

        Ok(u32::try_from(response.total).unwrap_or(u32::MAX))
    }
}
