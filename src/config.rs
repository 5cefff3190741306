use serde::Deserialize;

use crate::db::geo_cache::MAX_TTL_DAYS;
use crate::models::Weighting;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL for the geo cache.
    /// When unset the geo cache lives in process memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL for the search response cache and call quota.
    /// When unset outbound calls are neither cached nor metered.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Naver Open API client id
    pub naver_client_id: String,

    /// Naver Open API client secret
    pub naver_client_secret: String,

    /// Naver Open API base URL
    #[serde(default = "default_naver_api_url")]
    pub naver_api_url: String,

    /// Naver map place-summary base URL (venue detail lookups)
    #[serde(default = "default_naver_place_api_url")]
    pub naver_place_api_url: String,

    /// Use venue-detail lookups as the first enrichment strategy
    #[serde(default)]
    pub place_detail_enabled: bool,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of candidates enriched per search, shared across categories
    #[serde(default = "default_enrich_limit")]
    pub enrich_limit: usize,

    /// Maximum number of local-search sub-queries in flight per category
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,

    /// A cached search is reused when the new query point lies within this distance
    #[serde(default = "default_geo_cache_radius_meters")]
    pub geo_cache_radius_meters: f64,

    /// Cached searches older than this are ignored
    #[serde(default = "default_geo_cache_ttl_days")]
    pub geo_cache_ttl_days: i64,

    /// Weighting applied by the random picker
    #[serde(default)]
    pub pick_weighting: Weighting,

    /// Daily Naver Open API call budget (Naver's default per-application limit)
    #[serde(default = "default_naver_daily_quota")]
    pub naver_daily_quota: u32,

    /// TTL for cached local-search responses in Redis
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,
}

fn default_naver_api_url() -> String {
    "https://openapi.naver.com".to_string()
}

fn default_naver_place_api_url() -> String {
    "https://map.naver.com".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_enrich_limit() -> usize {
    30
}

fn default_search_concurrency() -> usize {
    4
}

fn default_geo_cache_radius_meters() -> f64 {
    500.0
}

fn default_geo_cache_ttl_days() -> i64 {
    7
}

fn default_naver_daily_quota() -> u32 {
    25_000
}

fn default_search_cache_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the cache layers cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_TTL_DAYS).contains(&self.geo_cache_ttl_days) {
            anyhow::bail!(
                "GEO_CACHE_TTL_DAYS must be between 1 and {}, got {}",
                MAX_TTL_DAYS,
                self.geo_cache_ttl_days
            );
        }
        if !self.geo_cache_radius_meters.is_finite() || self.geo_cache_radius_meters <= 0.0 {
            anyhow::bail!(
                "GEO_CACHE_RADIUS_METERS must be a positive distance, got {}",
                self.geo_cache_radius_meters
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config: Config = tokio_test::assert_ok!(envy::from_iter(vars(&[
            ("NAVER_CLIENT_ID", "id"),
            ("NAVER_CLIENT_SECRET", "secret"),
        ])));

        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.naver_api_url, "https://openapi.naver.com");
        assert!(!config.place_detail_enabled);
        assert_eq!(config.port, 3000);
        assert_eq!(config.enrich_limit, 30);
        assert_eq!(config.search_concurrency, 4);
        assert_eq!(config.geo_cache_radius_meters, 500.0);
        assert_eq!(config.geo_cache_ttl_days, 7);
        assert_eq!(config.pick_weighting, Weighting::Linear);
        assert_eq!(config.naver_daily_quota, 25_000);
    }

    #[test]
    fn test_overrides_parsed() {
        let config: Config = envy::from_iter(vars(&[
            ("NAVER_CLIENT_ID", "id"),
            ("NAVER_CLIENT_SECRET", "secret"),
            ("DATABASE_URL", "postgres://localhost/dinepick"),
            ("ENRICH_LIMIT", "12"),
            ("PICK_WEIGHTING", "sqrt"),
            ("PLACE_DETAIL_ENABLED", "true"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/dinepick")
        );
        assert_eq!(config.enrich_limit, 12);
        assert_eq!(config.pick_weighting, Weighting::Sqrt);
        assert!(config.place_detail_enabled);
    }

    #[test]
    fn test_defaults_pass_validation() {
        let config: Config = envy::from_iter(vars(&[
            ("NAVER_CLIENT_ID", "id"),
            ("NAVER_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_out_of_range_ttl_rejected() {
        for ttl in ["0", "-3", "366", "9223372036854775807"] {
            let config: Config = envy::from_iter(vars(&[
                ("NAVER_CLIENT_ID", "id"),
                ("NAVER_CLIENT_SECRET", "secret"),
                ("GEO_CACHE_TTL_DAYS", ttl),
            ]))
            .unwrap();
            tokio_test::assert_err!(config.validate());
        }
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let config: Config = envy::from_iter(vars(&[
            ("NAVER_CLIENT_ID", "id"),
            ("NAVER_CLIENT_SECRET", "secret"),
            ("GEO_CACHE_RADIUS_METERS", "0"),
        ]))
        .unwrap();
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result: Result<Config, _> = envy::from_iter(vars(&[("PORT", "8080")]));
        tokio_test::assert_err!(result);
    }
}
