//! Location-keyed cache of completed searches.
//!
//! A search record remembers which restaurant ids a category search found
//! around a point. Later searches within the configured radius and TTL reuse
//! those ids instead of hitting the search APIs again. Writes go through a
//! background task so callers never wait on persistence.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::models::{CachedRestaurant, Candidate, Category, GeoPoint, SearchRecord};

/// Rows per upsert statement; a failed batch is retried one row at a time
pub const UPSERT_BATCH_SIZE: usize = 5;

/// Upper bound on how long a cached search may be reused
pub const MAX_TTL_DAYS: i64 = 365;

/// Persistence behind [`GeoCache`]
#[async_trait::async_trait]
pub trait GeoCacheStore: Send + Sync {
    /// Most recent record for `category` within `radius_meters` of the point,
    /// cached no earlier than `min_cached_at`
    async fn find_nearby(
        &self,
        lat: f64,
        lng: f64,
        category: &str,
        radius_meters: f64,
        min_cached_at: DateTime<Utc>,
    ) -> AppResult<Option<SearchRecord>>;

    async fn upsert_records(&self, records: &[CachedRestaurant]) -> AppResult<()>;

    async fn insert_search_record(&self, record: &SearchRecord) -> AppResult<()>;

    /// Rows for the given ids, in any order; unknown ids are skipped
    async fn load_records(&self, ids: &[String]) -> AppResult<Vec<CachedRestaurant>>;
}

enum WriteCommand {
    Store {
        record: SearchRecord,
        rows: Vec<CachedRestaurant>,
    },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Clone)]
pub struct GeoCache {
    store: Arc<dyn GeoCacheStore>,
    radius_meters: f64,
    ttl: Duration,
    write_tx: mpsc::UnboundedSender<WriteCommand>,
}

/// Stops the geo-cache writer after applying everything already queued
pub struct GeoCacheWriterHandle {
    write_tx: mpsc::UnboundedSender<WriteCommand>,
    task: JoinHandle<()>,
}

impl GeoCacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.write_tx.send(WriteCommand::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Geo cache writer task panicked");
        }
        tracing::info!("Geo cache writer stopped");
    }
}

impl GeoCache {
    pub fn new(
        store: Arc<dyn GeoCacheStore>,
        radius_meters: f64,
        ttl_days: i64,
    ) -> (Self, GeoCacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(Self::writer_task(store.clone(), write_rx));

        let cache = Self {
            store,
            radius_meters,
            ttl: Duration::days(ttl_days.clamp(0, MAX_TTL_DAYS)),
            write_tx: write_tx.clone(),
        };

        (cache, GeoCacheWriterHandle { write_tx, task })
    }

    /// Ids from the freshest nearby search for `category`, if any.
    ///
    /// Store failures are logged and reported as a miss.
    pub async fn lookup(&self, origin: GeoPoint, category: Category) -> Option<Vec<String>> {
        let min_cached_at = Utc::now() - self.ttl;

        match self
            .store
            .find_nearby(
                origin.lat,
                origin.lng,
                category.key(),
                self.radius_meters,
                min_cached_at,
            )
            .await
        {
            Ok(Some(record)) => {
                tracing::debug!(
                    category = %category,
                    area = record.area_label.as_deref().unwrap_or(""),
                    ids = record.result_ids.len(),
                    "Geo cache hit"
                );
                Some(record.result_ids)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, category = %category, "Geo cache lookup failed");
                None
            }
        }
    }

    /// Loads cached restaurants in `ids` order, with distance re-derived
    /// from `origin`. Ids with no stored row are skipped.
    pub async fn load_candidates(&self, ids: &[String], origin: Option<GeoPoint>) -> Vec<Candidate> {
        if ids.is_empty() {
            return Vec::new();
        }

        let rows = match self.store.load_records(ids).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cached restaurants");
                return Vec::new();
            }
        };

        let mut by_id: HashMap<String, CachedRestaurant> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();

        ids.iter()
            .filter_map(|id| by_id.remove(id))
            .map(|row| row.into_candidate(origin))
            .collect()
    }

    /// Queues a search result for persistence and returns immediately.
    /// Empty results are never cached.
    pub fn store(
        &self,
        origin: GeoPoint,
        category: Category,
        area_label: Option<&str>,
        candidates: &[Candidate],
    ) {
        if candidates.is_empty() {
            tracing::debug!(category = %category, "Skipping geo cache store for empty result");
            return;
        }

        let cached_at = Utc::now();
        let rows = candidates
            .iter()
            .map(|c| CachedRestaurant::from_candidate(c, cached_at))
            .collect();
        let record = SearchRecord {
            latitude: origin.lat,
            longitude: origin.lng,
            category: category.key().to_string(),
            area_label: area_label.map(str::to_string),
            result_ids: candidates.iter().map(|c| c.id.clone()).collect(),
            cached_at,
        };

        if self
            .write_tx
            .send(WriteCommand::Store { record, rows })
            .is_err()
        {
            tracing::error!(category = %category, "Geo cache writer is gone, dropping write");
        }
    }

    /// Waits until every write queued before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.write_tx.send(WriteCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    async fn writer_task(
        store: Arc<dyn GeoCacheStore>,
        mut write_rx: mpsc::UnboundedReceiver<WriteCommand>,
    ) {
        tracing::info!("Geo cache writer task started");

        while let Some(command) = write_rx.recv().await {
            match command {
                WriteCommand::Store { record, rows } => {
                    Self::apply_write(store.as_ref(), record, rows).await
                }
                WriteCommand::Flush(done) => {
                    let _ = done.send(());
                }
                WriteCommand::Shutdown => break,
            }
        }
    }

    async fn apply_write(store: &dyn GeoCacheStore, record: SearchRecord, rows: Vec<CachedRestaurant>) {
        let mut saved = 0usize;

        for batch in rows.chunks(UPSERT_BATCH_SIZE) {
            match store.upsert_records(batch).await {
                Ok(()) => saved += batch.len(),
                Err(e) => {
                    tracing::warn!(error = %e, batch = batch.len(), "Batch upsert failed, retrying per row");
                    for row in batch {
                        match store.upsert_records(std::slice::from_ref(row)).await {
                            Ok(()) => saved += 1,
                            Err(e) => {
                                tracing::warn!(error = %e, id = %row.id, "Failed to cache restaurant")
                            }
                        }
                    }
                }
            }
        }

        match store.insert_search_record(&record).await {
            Ok(()) => tracing::debug!(
                category = %record.category,
                saved,
                total = rows.len(),
                "Geo cache updated"
            ),
            Err(e) => {
                tracing::warn!(error = %e, category = %record.category, "Failed to record search")
            }
        }
    }
}

#[derive(Default)]
struct MemoryTables {
    restaurants: HashMap<String, CachedRestaurant>,
    searches: Vec<SearchRecord>,
}

/// Process-local store used when no database is configured.
///
/// Meant for development and tests. Search records past the retention window
/// are dropped on each insert; restaurant rows are kept for the process
/// lifetime.
#[derive(Default)]
pub struct InMemoryGeoCacheStore {
    tables: RwLock<MemoryTables>,
    retention: Option<Duration>,
}

impl InMemoryGeoCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prunes search records older than `ttl_days` whenever one is inserted
    pub fn with_retention(ttl_days: i64) -> Self {
        Self {
            retention: Some(Duration::days(ttl_days.clamp(0, MAX_TTL_DAYS))),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl GeoCacheStore for InMemoryGeoCacheStore {
    async fn find_nearby(
        &self,
        lat: f64,
        lng: f64,
        category: &str,
        radius_meters: f64,
        min_cached_at: DateTime<Utc>,
    ) -> AppResult<Option<SearchRecord>> {
        let origin = GeoPoint::new(lat, lng);
        let tables = self.tables.read().await;

        Ok(tables
            .searches
            .iter()
            .filter(|r| r.category == category && r.cached_at >= min_cached_at)
            .filter(|r| origin.distance_meters(&r.location()) <= radius_meters)
            .max_by_key(|r| r.cached_at)
            .cloned())
    }

    async fn upsert_records(&self, records: &[CachedRestaurant]) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        for record in records {
            tables.restaurants.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn insert_search_record(&self, record: &SearchRecord) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(retention) = self.retention {
            let cutoff = Utc::now() - retention;
            tables.searches.retain(|r| r.cached_at >= cutoff);
        }
        tables.searches.push(record.clone());
        Ok(())
    }

    async fn load_records(&self, ids: &[String]) -> AppResult<Vec<CachedRestaurant>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.restaurants.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const METERS_PER_DEGREE_LAT: f64 = 111_195.0;

    fn origin() -> GeoPoint {
        GeoPoint::new(37.4979, 127.0276)
    }

    fn north_of(point: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(point.lat + meters / METERS_PER_DEGREE_LAT, point.lng)
    }

    fn candidate(id: &str, location: GeoPoint) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: format!("식당 {id}"),
            category: "한식>국밥".to_string(),
            address: "서울특별시 강남구 역삼동".to_string(),
            road_address: String::new(),
            phone: String::new(),
            latitude: location.lat,
            longitude: location.lng,
            distance_meters: None,
            rating: 0.0,
            review_count: 0,
            blog_review_count: 0,
            image_url: None,
            place_url: String::new(),
            curation_score: None,
        }
    }

    fn record_at(location: GeoPoint, age: Duration, ids: &[&str]) -> SearchRecord {
        SearchRecord {
            latitude: location.lat,
            longitude: location.lng,
            category: Category::Korean.key().to_string(),
            area_label: None,
            result_ids: ids.iter().map(|s| s.to_string()).collect(),
            cached_at: Utc::now() - age,
        }
    }

    async fn cache_with_record(record: SearchRecord) -> GeoCache {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        store.insert_search_record(&record).await.unwrap();
        GeoCache::new(store, 500.0, 7).0
    }

    #[tokio::test]
    async fn test_lookup_hit_within_radius() {
        let cache = cache_with_record(record_at(origin(), Duration::hours(1), &["1", "2"])).await;
        let ids = cache
            .lookup(north_of(origin(), 400.0), Category::Korean)
            .await;
        assert_eq!(ids, Some(vec!["1".to_string(), "2".to_string()]));
    }

    #[tokio::test]
    async fn test_lookup_miss_outside_radius() {
        let cache = cache_with_record(record_at(origin(), Duration::hours(1), &["1"])).await;
        assert_eq!(
            cache.lookup(north_of(origin(), 600.0), Category::Korean).await,
            None
        );
    }

    #[tokio::test]
    async fn test_lookup_miss_when_expired() {
        let cache = cache_with_record(record_at(origin(), Duration::days(8), &["1"])).await;
        assert_eq!(cache.lookup(origin(), Category::Korean).await, None);
    }

    #[tokio::test]
    async fn test_lookup_is_per_category() {
        let cache = cache_with_record(record_at(origin(), Duration::hours(1), &["1"])).await;
        assert_eq!(cache.lookup(origin(), Category::Cafe).await, None);
    }

    #[tokio::test]
    async fn test_absurd_ttl_is_capped() {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        store
            .insert_search_record(&record_at(origin(), Duration::days(400), &["1"]))
            .await
            .unwrap();
        let (cache, _writer) = GeoCache::new(store, 500.0, i64::MAX);

        assert_eq!(cache.ttl, Duration::days(MAX_TTL_DAYS));
        assert_eq!(cache.lookup(origin(), Category::Korean).await, None);
    }

    #[tokio::test]
    async fn test_in_memory_retention_drops_expired_searches() {
        let store = InMemoryGeoCacheStore::with_retention(7);
        store
            .insert_search_record(&record_at(origin(), Duration::days(10), &["old"]))
            .await
            .unwrap();
        store
            .insert_search_record(&record_at(origin(), Duration::hours(1), &["new"]))
            .await
            .unwrap();

        let tables = store.tables.read().await;
        assert_eq!(tables.searches.len(), 1);
        assert_eq!(tables.searches[0].result_ids, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_prefers_most_recent() {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        store
            .insert_search_record(&record_at(origin(), Duration::days(3), &["old"]))
            .await
            .unwrap();
        store
            .insert_search_record(&record_at(origin(), Duration::hours(2), &["new"]))
            .await
            .unwrap();
        let (cache, _writer) = GeoCache::new(store, 500.0, 7);

        assert_eq!(
            cache.lookup(origin(), Category::Korean).await,
            Some(vec!["new".to_string()])
        );
    }

    #[tokio::test]
    async fn test_store_then_load_preserves_order_and_distance() {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        let (cache, _writer) = GeoCache::new(store, 500.0, 7);

        let candidates = vec![
            candidate("b", north_of(origin(), 300.0)),
            candidate("a", north_of(origin(), 100.0)),
        ];
        cache.store(origin(), Category::Korean, Some("역삼동"), &candidates);
        cache.flush().await;

        let ids = cache.lookup(origin(), Category::Korean).await.unwrap();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

        let loaded = cache
            .load_candidates(&ids, Some(north_of(origin(), 100.0)))
            .await;
        assert_eq!(loaded[0].id, "b");
        assert_eq!(loaded[1].id, "a");
        assert!(loaded[1].distance_meters.unwrap() < 1.0);
        assert!((loaded[0].distance_meters.unwrap() - 200.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_stored() {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        let (cache, _writer) = GeoCache::new(store, 500.0, 7);

        cache.store(origin(), Category::Korean, None, &[]);
        cache.flush().await;

        assert_eq!(cache.lookup(origin(), Category::Korean).await, None);
    }

    #[tokio::test]
    async fn test_load_skips_unknown_ids() {
        let store = Arc::new(InMemoryGeoCacheStore::new());
        let (cache, _writer) = GeoCache::new(store, 500.0, 7);
        cache.store(origin(), Category::Korean, None, &[candidate("1", origin())]);
        cache.flush().await;

        let loaded = cache
            .load_candidates(&["gone".to_string(), "1".to_string()], None)
            .await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].distance_meters, None);
    }

    /// Rejects multi-row upserts so every write falls back to per-row retry.
    struct SingleRowOnlyStore {
        inner: InMemoryGeoCacheStore,
        upserts: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GeoCacheStore for SingleRowOnlyStore {
        async fn find_nearby(
            &self,
            lat: f64,
            lng: f64,
            category: &str,
            radius_meters: f64,
            min_cached_at: DateTime<Utc>,
        ) -> AppResult<Option<SearchRecord>> {
            self.inner
                .find_nearby(lat, lng, category, radius_meters, min_cached_at)
                .await
        }

        async fn upsert_records(&self, records: &[CachedRestaurant]) -> AppResult<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if records.len() > 1 {
                return Err(AppError::Internal("batch rejected".to_string()));
            }
            self.inner.upsert_records(records).await
        }

        async fn insert_search_record(&self, record: &SearchRecord) -> AppResult<()> {
            self.inner.insert_search_record(record).await
        }

        async fn load_records(&self, ids: &[String]) -> AppResult<Vec<CachedRestaurant>> {
            self.inner.load_records(ids).await
        }
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried_per_row() {
        let store = Arc::new(SingleRowOnlyStore {
            inner: InMemoryGeoCacheStore::new(),
            upserts: AtomicUsize::new(0),
        });
        let (cache, _writer) = GeoCache::new(store.clone(), 500.0, 7);

        let candidates: Vec<Candidate> = (0..7)
            .map(|i| candidate(&i.to_string(), origin()))
            .collect();
        cache.store(origin(), Category::Korean, None, &candidates);
        cache.flush().await;

        // two failed batches (5 + 2) followed by seven single-row upserts
        assert_eq!(store.upserts.load(Ordering::SeqCst), 9);

        let ids = cache.lookup(origin(), Category::Korean).await.unwrap();
        assert_eq!(cache.load_candidates(&ids, None).await.len(), 7);
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl GeoCacheStore for BrokenStore {
        async fn find_nearby(
            &self,
            _lat: f64,
            _lng: f64,
            _category: &str,
            _radius_meters: f64,
            _min_cached_at: DateTime<Utc>,
        ) -> AppResult<Option<SearchRecord>> {
            Err(AppError::Internal("store down".to_string()))
        }

        async fn upsert_records(&self, _records: &[CachedRestaurant]) -> AppResult<()> {
            Err(AppError::Internal("store down".to_string()))
        }

        async fn insert_search_record(&self, _record: &SearchRecord) -> AppResult<()> {
            Err(AppError::Internal("store down".to_string()))
        }

        async fn load_records(&self, _ids: &[String]) -> AppResult<Vec<CachedRestaurant>> {
            Err(AppError::Internal("store down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_degrade_to_miss() {
        let (cache, writer) = GeoCache::new(Arc::new(BrokenStore), 500.0, 7);

        cache.store(origin(), Category::Korean, None, &[candidate("1", origin())]);
        cache.flush().await;

        assert_eq!(cache.lookup(origin(), Category::Korean).await, None);
        assert!(cache
            .load_candidates(&["1".to_string()], None)
            .await
            .is_empty());

        writer.shutdown().await;
    }
}
