use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::error::{AppError, Res};
use dashmap::DashMap;
use deadpool_redis::Pool;

/// Expired windows are dropped from [`MemoryCounter`] once every this many hits.
const SWEEP_EVERY: u64 = 256;

/// Fixed-window request counter keyed by identity.
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Counts one request for `key` and returns the number of requests seen
    /// in the current window, this one included.
    async fn hit(&self, key: &str, window: Duration) -> Res<u64>;
}

/// Process-local counter, for single-instance deployments and tests.
#[derive(Default)]
pub struct MemoryCounter {
    windows: DashMap<String, (Instant, u64)>,
    hits: AtomicU64,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every window older than `window`.
    pub fn evict_expired(&self, window: Duration) {
        let now = Instant::now();
        self.windows
            .retain(|_, (started, _)| now.duration_since(*started) < window);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateCounter for MemoryCounter {
    async fn hit(&self, key: &str, window: Duration) -> Res<u64> {
        // no entry guard may be alive while sweeping
        if (self.hits.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.evict_expired(window);
        }

        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert((now, 0));
        let (started, count) = entry.value_mut();
        if now.duration_since(*started) >= window {
            *started = now;
            *count = 0;
        }
        *count += 1;
        Ok(*count)
    }
}

/// Counter shared by every instance through Redis.
pub struct RedisCounter {
    pool: Pool,
}

impl RedisCounter {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_url(redis_url: &str) -> Res<Self> {
        let pool = deadpool_redis::Config::from_url(redis_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| AppError::Internal(format!("Failed to create Redis pool: {}", e)))?;
        Ok(Self::new(pool))
    }
}

/// `MULTI; SET key 0 EX secs NX; INCR key; EXEC`: the key is created with its
/// TTL in the same transaction that counts the hit.
pub fn window_pipeline(redis_key: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(redis_key)
        .arg(0)
        .arg("EX")
        .arg(window.as_secs().max(1))
        .arg("NX")
        .ignore()
        .incr(redis_key, 1);
    pipe
}

#[async_trait]
impl RateCounter for RedisCounter {
    async fn hit(&self, key: &str, window: Duration) -> Res<u64> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))?;

        let redis_key = format!("ratelimit:{}", key);
        let (count,): (u64,) = window_pipeline(&redis_key, window)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                AppError::Internal(format!("Redis error counting {}: {}", redis_key, e))
            })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_within_window() {
        let counter = MemoryCounter::new();
        let window = Duration::from_secs(60);
        assert_eq!(counter.hit("user:a", window).await.unwrap(), 1);
        assert_eq!(counter.hit("user:a", window).await.unwrap(), 2);
        assert_eq!(counter.hit("user:b", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn window_expiry_resets_count() {
        let counter = MemoryCounter::new();
        let window = Duration::from_millis(20);
        counter.hit("ip:1", window).await.unwrap();
        counter.hit("ip:1", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.hit("ip:1", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_windows_are_evicted() {
        let counter = MemoryCounter::new();
        let window = Duration::from_millis(20);
        for i in 0..10 {
            counter.hit(&format!("ip:{}", i), window).await.unwrap();
        }
        assert_eq!(counter.tracked(), 10);
        tokio::time::sleep(Duration::from_millis(30)).await;

        // the periodic sweep runs from `hit` itself
        for _ in 0..SWEEP_EVERY {
            counter.hit("user:live", window).await.unwrap();
        }
        assert_eq!(counter.tracked(), 1);
    }

    #[test]
    fn redis_window_sets_ttl_with_the_increment() {
        let packed = window_pipeline("ratelimit:user:a", Duration::from_secs(60))
            .get_packed_pipeline();
        let text = String::from_utf8_lossy(&packed);
        let multi = text.find("MULTI").unwrap();
        let set = text.find("SET").unwrap();
        let incr = text.find("INCR").unwrap();
        let exec = text.find("EXEC").unwrap();
        assert!(multi < set && set < incr && incr < exec);
        assert!(text.contains("NX"));
        assert!(text.contains("\r\n60\r\n"));
    }

    #[tokio::test]
    #[ignore = "requires redis"]
    async fn redis_keys_always_expire() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let counter = RedisCounter::from_url(&url).unwrap();
        let key = format!("test:{}", std::process::id());
        let window = Duration::from_secs(30);

        assert_eq!(counter.hit(&key, window).await.unwrap(), 1);
        assert_eq!(counter.hit(&key, window).await.unwrap(), 2);

        let mut conn = counter.pool.get().await.unwrap();
        let ttl: i64 = redis::cmd("TTL")
            .arg(format!("ratelimit:{}", key))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(ttl > 0 && ttl <= 30);
    }
}
