use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::SearchSort;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    LocalSearch { query: String, sort: SearchSort },
    ImageSearch(String),
    Popularity(String),
    /// Naver call counter for one day (`YYYY-MM-DD`)
    NaverUsage(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::LocalSearch { query, sort } => {
                write!(f, "local:{}:{}", sort.as_str(), query.trim().to_lowercase())
            }
            CacheKey::ImageSearch(query) => write!(f, "image:{}", query.trim().to_lowercase()),
            CacheKey::Popularity(query) => write!(f, "blog:{}", query.trim().to_lowercase()),
            CacheKey::NaverUsage(day) => write!(f, "quota:naver:{}", day),
        }
    }
}

/// Validates the URL only; connections are opened per operation
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// Queued writes sent to Redis in one pipeline round trip
const WRITE_BATCH_SIZE: usize = 32;

struct PendingWrite {
    key: String,
    value: String,
    ttl: u64,
}

enum CacheCommand {
    Write(PendingWrite),
    Shutdown,
}

/// Redis-backed response cache with a background write queue
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheCommand>,
}

/// Stops the cache writer once everything queued so far is written
pub struct CacheWriterHandle {
    write_tx: mpsc::UnboundedSender<CacheCommand>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.write_tx.send(CacheCommand::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
        tracing::info!("Cache writer stopped");
    }
}

impl Cache {
    /// Creates the cache and spawns its writer task.
    ///
    /// No connection is made here; Redis being down only surfaces as failed
    /// reads (treated as misses) and logged write failures.
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(Self::writer_task(redis_client.clone(), write_rx));

        let cache = Self {
            redis_client,
            write_tx: write_tx.clone(),
        };

        (cache, CacheWriterHandle { write_tx, task })
    }

    /// Drains the queue in batches of up to `WRITE_BATCH_SIZE`
    async fn writer_task(client: Client, mut write_rx: mpsc::UnboundedReceiver<CacheCommand>) {
        tracing::info!("Cache writer task started");
        let mut batch: Vec<PendingWrite> = Vec::with_capacity(WRITE_BATCH_SIZE);

        while let Some(command) = write_rx.recv().await {
            let mut stop = matches!(command, CacheCommand::Shutdown);
            if let CacheCommand::Write(write) = command {
                batch.push(write);
            }

            while !stop && batch.len() < WRITE_BATCH_SIZE {
                match write_rx.try_recv() {
                    Ok(CacheCommand::Write(write)) => batch.push(write),
                    Ok(CacheCommand::Shutdown) => stop = true,
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                if let Err(e) = Self::write_batch(&client, &batch).await {
                    tracing::warn!(error = %e, writes = batch.len(), "Failed to write to Redis cache");
                }
                batch.clear();
            }

            if stop {
                break;
            }
        }
    }

    async fn write_batch(client: &Client, batch: &[PendingWrite]) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let mut pipe = redis::pipe();
        for write in batch {
            pipe.set_ex(&write.key, &write.value, write.ttl).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// `None` when the key is absent
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Corrupt cache entry {}: {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Queues a value for writing without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to serialize cache value");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if self.write_tx.send(CacheCommand::Write(write)).is_err() {
            tracing::error!(key = %key, "Cache writer is gone, dropping write");
        }
    }

    /// Reads a usage counter (0 when absent)
    pub async fn usage(&self, key: &CacheKey) -> AppResult<u32> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let count: Option<u32> = conn.get(key.to_string()).await?;
        Ok(count.unwrap_or(0))
    }

    /// Increments a usage counter and (re)sets its expiry
    pub async fn increment_usage(&self, key: &CacheKey, ttl: i64) -> AppResult<u32> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let count: u32 = conn.incr(key.to_string(), 1).await?;
        let _: () = conn.expire(key.to_string(), ttl).await?;
        Ok(count)
    }
}
