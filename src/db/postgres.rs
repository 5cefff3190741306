use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::db::geo_cache::GeoCacheStore;
use crate::error::AppResult;
use crate::models::{CachedRestaurant, SearchRecord};

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

const RESTAURANT_COLUMNS: &str = "id, name, category, address, road_address, phone, latitude, \
     longitude, rating, review_count, blog_review_count, image_url, place_url, is_enriched, cached_at";

/// Geo-cache store backed by the `cached_restaurants` and `search_cache` tables
#[derive(Clone)]
pub struct PgGeoCacheStore {
    pool: PgPool,
}

impl PgGeoCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GeoCacheStore for PgGeoCacheStore {
    async fn find_nearby(
        &self,
        lat: f64,
        lng: f64,
        category: &str,
        radius_meters: f64,
        min_cached_at: DateTime<Utc>,
    ) -> AppResult<Option<SearchRecord>> {
        // Haversine, same Earth radius as GeoPoint::distance_meters
        let record = sqlx::query_as::<_, SearchRecord>(
            r#"
            SELECT latitude, longitude, category, area_label, result_ids, cached_at
            FROM search_cache
            WHERE category = $1
              AND cached_at >= $2
              AND 6371000.0 * 2.0 * ASIN(SQRT(
                    POWER(SIN(RADIANS(latitude - $3) / 2.0), 2)
                    + COS(RADIANS($3)) * COS(RADIANS(latitude))
                      * POWER(SIN(RADIANS(longitude - $4) / 2.0), 2)
                  )) <= $5
            ORDER BY cached_at DESC
            LIMIT 1
            "#,
        )
        .bind(category)
        .bind(min_cached_at)
        .bind(lat)
        .bind(lng)
        .bind(radius_meters)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_records(&self, records: &[CachedRestaurant]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO cached_restaurants ({}) ", RESTAURANT_COLUMNS));

        builder.push_values(records, |mut row, r| {
            row.push_bind(r.id.clone())
                .push_bind(r.name.clone())
                .push_bind(r.category.clone())
                .push_bind(r.address.clone())
                .push_bind(r.road_address.clone())
                .push_bind(r.phone.clone())
                .push_bind(r.latitude)
                .push_bind(r.longitude)
                .push_bind(r.rating)
                .push_bind(r.review_count)
                .push_bind(r.blog_review_count)
                .push_bind(r.image_url.clone())
                .push_bind(r.place_url.clone())
                .push_bind(r.is_enriched)
                .push_bind(r.cached_at);
        });

        builder.push(
            " ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, \
             category = EXCLUDED.category, \
             address = EXCLUDED.address, \
             road_address = EXCLUDED.road_address, \
             phone = EXCLUDED.phone, \
             latitude = EXCLUDED.latitude, \
             longitude = EXCLUDED.longitude, \
             rating = EXCLUDED.rating, \
             review_count = EXCLUDED.review_count, \
             blog_review_count = EXCLUDED.blog_review_count, \
             image_url = EXCLUDED.image_url, \
             place_url = EXCLUDED.place_url, \
             is_enriched = EXCLUDED.is_enriched, \
             cached_at = EXCLUDED.cached_at",
        );

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_search_record(&self, record: &SearchRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO search_cache (latitude, longitude, category, area_label, result_ids, cached_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.category)
        .bind(&record.area_label)
        .bind(&record.result_ids)
        .bind(record.cached_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_records(&self, ids: &[String]) -> AppResult<Vec<CachedRestaurant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, CachedRestaurant>(&format!(
            "SELECT {} FROM cached_restaurants WHERE id = ANY($1)",
            RESTAURANT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
