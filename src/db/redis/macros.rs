/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present. Otherwise awaits `$block`, queues
/// the result for a background write with `$ttl` seconds, and returns it.
/// A failed cache read is logged and treated as a miss, so Redis being
/// unavailable never fails the call.
///
/// # Arguments
/// * `$cache`: anything with `get_from_cache` and `set_in_background`
/// * `$key`: the `CacheKey` to read and write
/// * `$ttl`: time-to-live in seconds
/// * `$block`: future computing the value on a miss; its error is propagated
///
/// # Example
/// ```rust,ignore
/// cached!(self.cache, CacheKey::ImageSearch(query.to_string()), 86_400, async {
///     self.inner.search_images(query).await
/// })
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        let hit = match $cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        };

        if let Some(cached) = hit {
            tracing::debug!(key = %key, "Cache hit");
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
