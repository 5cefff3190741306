pub mod geo_cache;
pub mod postgres;
pub mod redis;

pub use self::geo_cache::{GeoCache, GeoCacheStore, GeoCacheWriterHandle, InMemoryGeoCacheStore};
pub use self::postgres::{create_pool, PgGeoCacheStore};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
