use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dinepick_api::{
    config::Config,
    db::{
        create_pool, create_redis_client, Cache, GeoCache, GeoCacheStore, InMemoryGeoCacheStore,
        PgGeoCacheStore,
    },
    routes::{create_router, AppState},
    services::{
        providers::{
            CachedProvider, ImageSearchProvider, LocalSearchProvider, NaverClient,
            NaverPlaceClient, PopularityProvider,
        },
        DiscoveryOrchestrator, EnrichmentClient, QueryExpander,
    },
};

type SearchProviders = (
    Arc<dyn LocalSearchProvider>,
    Arc<dyn ImageSearchProvider>,
    Arc<dyn PopularityProvider>,
);

fn split_providers<P>(provider: Arc<P>) -> SearchProviders
where
    P: LocalSearchProvider + ImageSearchProvider + PopularityProvider + 'static,
{
    (provider.clone(), provider.clone(), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dinepick_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn GeoCacheStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url)
                .await
                .context("Failed to connect to Postgres")?;
            tracing::info!("Geo cache backed by Postgres");
            Arc::new(PgGeoCacheStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, geo cache is in-memory only");
            Arc::new(InMemoryGeoCacheStore::with_retention(
                config.geo_cache_ttl_days,
            ))
        }
    };
    let (geo_cache, geo_writer) = GeoCache::new(
        store,
        config.geo_cache_radius_meters,
        config.geo_cache_ttl_days,
    );

    let naver = NaverClient::new(
        config.naver_client_id.clone(),
        config.naver_client_secret.clone(),
        config.naver_api_url.clone(),
    )?;

    let (cache_writer, (local, image, popularity)) = match &config.redis_url {
        Some(url) => {
            let (cache, writer) = Cache::new(create_redis_client(url)?);
            tracing::info!(
                daily_quota = config.naver_daily_quota,
                "Naver responses cached in Redis"
            );
            let provider = CachedProvider::new(
                naver,
                cache,
                config.naver_daily_quota,
                config.search_cache_ttl_secs,
            );
            (Some(writer), split_providers(Arc::new(provider)))
        }
        None => {
            tracing::warn!("REDIS_URL not set, Naver responses are not cached or metered");
            (None, split_providers(Arc::new(naver)))
        }
    };

    let mut enricher = EnrichmentClient::new(image, popularity);
    if config.place_detail_enabled {
        enricher = enricher.with_place_detail(Arc::new(NaverPlaceClient::new(
            config.naver_place_api_url.clone(),
        )?));
    }

    let discovery = DiscoveryOrchestrator::new(
        geo_cache,
        QueryExpander::new(local, config.search_concurrency),
        enricher,
        config.enrich_limit,
    );

    let state = Arc::new(AppState {
        discovery,
        weighting: config.pick_weighting,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    geo_writer.shutdown().await;
    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
