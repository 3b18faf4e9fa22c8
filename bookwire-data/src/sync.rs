use crate::error::{DataError, StoreError};
use async_trait::async_trait;
use bookwire_instrument::ChainId;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::info;

/// Shared cache holding the per-chain "WebSocket enable block" watermark.
///
/// Single writer at startup, many readers; entries never expire.
#[async_trait]
pub trait WatermarkCache: Send + Sync {
    async fn load(&self, chain: ChainId) -> Result<Option<u64>, StoreError>;
    async fn store(&self, chain: ChainId, block: u64) -> Result<(), StoreError>;
}

/// In-memory [`WatermarkCache`] used for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWatermarkCache {
    inner: Arc<Mutex<HashMap<u64, u64>>>,
}

impl InMemoryWatermarkCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkCache for InMemoryWatermarkCache {
    async fn load(&self, chain: ChainId) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.lock().get(&chain.0).copied())
    }

    async fn store(&self, chain: ChainId, block: u64) -> Result<(), StoreError> {
        self.inner.lock().insert(chain.0, block);
        Ok(())
    }
}

/// Redis backed [`WatermarkCache`] used in production. Keys carry no expiry.
#[derive(Clone)]
pub struct RedisWatermarkCache {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisWatermarkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWatermarkCache").finish()
    }
}

impl RedisWatermarkCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        Ok(Self::new(conn))
    }

    fn key(chain: ChainId) -> String {
        chain.stream_key("ws_enable_block")
    }
}

#[async_trait]
impl WatermarkCache for RedisWatermarkCache {
    async fn load(&self, chain: ChainId) -> Result<Option<u64>, StoreError> {
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::key(chain))
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        Ok(value.and_then(|value| value.parse().ok()))
    }

    async fn store(&self, chain: ChainId, block: u64) -> Result<(), StoreError> {
        let _: () = redis::cmd("SET")
            .arg(Self::key(chain))
            .arg(block)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        Ok(())
    }
}

/// Process-wide predicate guarding live push emission.
///
/// Handlers always perform durable writes; only the stream appends that feed
/// WebSocket push are guarded. The watermark is resolved once at startup and
/// only ever advances within a process.
#[derive(Debug)]
pub struct SyncGate {
    chain: ChainId,
    watermark: AtomicU64,
}

impl SyncGate {
    /// Resolve the watermark and construct the gate.
    ///
    /// Precedence: an explicit override (operator-driven, doubles as the
    /// reset path after a data wipe) overwrites the cache; otherwise the
    /// cached value wins; otherwise `boot_head` (the chain head observed at
    /// boot) is cached and used. Initialising twice yields the same
    /// watermark.
    pub async fn initialise(
        cache: &dyn WatermarkCache,
        chain: ChainId,
        override_block: Option<u64>,
        boot_head: u64,
    ) -> Result<Self, DataError> {
        let watermark = match override_block {
            Some(block) => {
                cache.store(chain, block).await?;
                block
            }
            None => match cache.load(chain).await? {
                Some(block) => block,
                None => {
                    cache.store(chain, boot_head).await?;
                    boot_head
                }
            },
        };

        info!(%chain, watermark, "sync gate initialised");
        Ok(Self {
            chain,
            watermark: AtomicU64::new(watermark),
        })
    }

    /// Gate that is always in sync. Test helper.
    pub fn always_in_sync(chain: ChainId) -> Self {
        Self {
            chain,
            watermark: AtomicU64::new(0),
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Relaxed)
    }

    /// Has the indexer caught up past the enable block?
    pub fn is_in_sync(&self, current_event_block: u64) -> bool {
        current_event_block >= self.watermark()
    }

    /// Run `live_push` only when `block` is at or past the watermark.
    /// Returns whether the live push side ran. Never errors on the gate
    /// itself; a false predicate silently suppresses emission.
    pub async fn execute_if_in_sync<F, Fut>(&self, block: u64, live_push: F) -> Result<bool, DataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), DataError>>,
    {
        if !self.is_in_sync(block) {
            return Ok(false);
        }
        live_push().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialise_precedence() {
        let cache = InMemoryWatermarkCache::new();
        let chain = ChainId(1);

        // No cache entry: boot head is adopted and cached.
        let gate = SyncGate::initialise(&cache, chain, None, 500).await.unwrap();
        assert_eq!(gate.watermark(), 500);

        // Second initialise yields the same watermark (idempotent enable).
        let gate = SyncGate::initialise(&cache, chain, None, 900).await.unwrap();
        assert_eq!(gate.watermark(), 500);

        // Explicit override overwrites the cache.
        let gate = SyncGate::initialise(&cache, chain, Some(100), 900)
            .await
            .unwrap();
        assert_eq!(gate.watermark(), 100);
        assert_eq!(cache.load(chain).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_execute_if_in_sync() {
        let cache = InMemoryWatermarkCache::new();
        let gate = SyncGate::initialise(&cache, ChainId(1), Some(100), 0)
            .await
            .unwrap();

        let ran = gate
            .execute_if_in_sync(99, || async { Ok(()) })
            .await
            .unwrap();
        assert!(!ran);

        let ran = gate
            .execute_if_in_sync(100, || async { Ok(()) })
            .await
            .unwrap();
        assert!(ran);
    }
}
