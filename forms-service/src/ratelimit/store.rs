//! Counter storage backends for rate limiting.
//!
//! Two backends behind one trait:
//! - Redis for deployments with more than one web process (atomic INCR with
//!   TTL-based expiry)
//! - In-memory for development, single-instance deployments, and tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Trait for rate-limit counter storage.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, starting a fresh window of
    /// `window_seconds` on first increment. Returns the count after the
    /// increment and the seconds remaining until the window resets.
    async fn incr(&self, key: &str, window_seconds: u64) -> Result<(u64, u64), String>;
}

/// Redis-backed counter store.
pub struct RedisCounterStore {
    connection_manager: Arc<ConnectionManager>,
}

impl RedisCounterStore {
    /// Create a new Redis counter store and verify the connection.
    pub async fn new(url: &str) -> Result<Self, String> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client for rate limiting: {}", e);
            format!("Failed to create Redis client: {}", e)
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!("Failed to create connection manager for rate limiting: {}", e);
            format!("Failed to create connection manager: {}", e)
        })?;

        // Test connection
        let mut conn = connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Failed to ping Redis for rate limiting: {}", e);
                format!("Failed to ping Redis: {}", e)
            })?;

        debug!("Connected to Redis for rate limiting");

        Ok(Self {
            connection_manager: Arc::new(connection_manager),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str, window_seconds: u64) -> Result<(u64, u64), String> {
        let mut conn = (*self.connection_manager).clone();

        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("Redis INCR error: {}", e))?;

        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_seconds)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| format!("Redis EXPIRE error: {}", e))?;
        }

        let ttl: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("Redis TTL error: {}", e))?;

        // A negative TTL means the EXPIRE was lost (e.g. a crash between
        // INCR and EXPIRE); re-arm it so the key cannot live forever.
        let remaining = if ttl < 0 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_seconds)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| format!("Redis EXPIRE error: {}", e))?;
            window_seconds
        } else {
            ttl as u64
        };

        Ok((count, remaining))
    }
}

struct CounterEntry {
    count: u64,
    expires_at: u64,
}

/// In-memory counter store for development and single-instance deployments.
pub struct InMemoryCounterStore {
    counters: Arc<RwLock<HashMap<String, CounterEntry>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn current_time() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str, window_seconds: u64) -> Result<(u64, u64), String> {
        let now = Self::current_time();
        let mut counters = self.counters.write().await;

        // Sweep expired entries once the map grows large.
        if counters.len() >= 4096 {
            counters.retain(|_, entry| entry.expires_at > now);
        }

        let entry = counters.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: now + window_seconds,
        });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window_seconds;
        }

        entry.count += 1;
        Ok((entry.count, entry.expires_at.saturating_sub(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_counts_up() {
        let store = InMemoryCounterStore::new();

        let (count, remaining) = store.incr("test:key", 3600).await.unwrap();
        assert_eq!(count, 1);
        assert!(remaining > 0 && remaining <= 3600);

        let (count, _) = store.incr("test:key", 3600).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_in_memory_keys_independent() {
        let store = InMemoryCounterStore::new();

        store.incr("test:a", 3600).await.unwrap();
        store.incr("test:a", 3600).await.unwrap();
        let (count, _) = store.incr("test:b", 3600).await.unwrap();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_in_memory_expired_window_resets() {
        let store = InMemoryCounterStore::new();

        // A zero-second window is already expired on the next call.
        store.incr("test:expiry", 0).await.unwrap();
        let (count, _) = store.incr("test:expiry", 3600).await.unwrap();

        assert_eq!(count, 1);
    }
}
