//! Two-tier fingerprint cache.
//!
//! L1 is a bounded in-process LRU with per-entry TTL; L2 is Redis with the
//! same TTL, reached lazily and tolerated when absent: every L2 failure is
//! logged and swallowed, the manager keeps serving L1. Keys are
//! `privacy:doc:<16 hex>` fingerprints derived from the normalized text,
//! the recognizer identity and the configuration hash; two inputs that
//! differ in any of the three produce different fingerprints.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use redis::AsyncCommands;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub use crate::models::CacheEntry;

const KEY_PREFIX: &str = "privacy:doc:";
const CLEAR_PATTERN: &str = "privacy:*";

/// First 8 hex chars of the MD5 of the canonical (key-sorted, no
/// whitespace) JSON rendering of the recognizer configuration.
pub fn config_hash<T: Serialize>(config: &T) -> String {
    let value = serde_json::to_value(config).unwrap_or(Value::Null);
    let canonical = canonical_json(&value);
    let digest = format!("{:x}", md5::compute(canonical.as_bytes()));
    digest[..8].to_string()
}

/// `privacy:doc:` + first 16 hex chars of
/// `sha256(normalized_text | recognizer_id | config_hash)`.
pub fn cache_key(normalized_text: &str, recognizer_id: &str, config_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.as_bytes());
    hasher.update(b"|");
    hasher.update(recognizer_id.as_bytes());
    hasher.update(b"|");
    hasher.update(config_hash.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", KEY_PREFIX, &digest[..16])
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub l1_max_size: usize,
    /// Redis connection string; `None` disables L2 entirely.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 86_400,
            l1_max_size: 1_000,
            redis_url: None,
        }
    }
}

/// Where a cache hit came from; recorded in result metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    L1,
    L2,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::L1 => "l1",
            CacheTier::L2 => "l2",
        }
    }
}

struct L1Entry {
    entry: CacheEntry,
    expires_at: Instant,
}

/// Recency-bounded in-process tier.
struct MemoryCache {
    entries: Mutex<LruCache<String, L1Entry>>,
    ttl: Duration,
    max_size: usize,
}

impl MemoryCache {
    fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("max(1) is non-zero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            max_size,
        }
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(held) if held.expires_at > Instant::now() => Some(held.entry.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: String, entry: CacheEntry) {
        let mut entries = self.entries.lock().await;
        entries.put(
            key,
            L1Entry {
                entry,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().await.pop(key);
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Distributed tier over Redis. The connection is established lazily and
/// dropped on error; the next operation retries.
struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<redis::aio::MultiplexedConnection>>,
    ttl_seconds: u64,
    connected: AtomicBool,
}

impl RedisCache {
    fn new(url: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: Mutex::new(None),
            ttl_seconds,
            connected: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        self.connected.store(true, Ordering::Relaxed);
        Ok(conn)
    }

    async fn drop_connection(&self) {
        *self.connection.lock().await = None;
        self.connected.store(false, Ordering::Relaxed);
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheEntry>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(key).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> anyhow::Result<()> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_seconds)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn clear_prefix(&self) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(CLEAR_PATTERN).await?;
        if !keys.is_empty() {
            let _: i64 = conn.del(keys).await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Advisory counters, reset with the process.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub l1_sets: u64,
    pub l2_sets: u64,
    pub hit_rate_pct: f64,
    pub l1_size: usize,
    pub l1_max_size: usize,
    pub l2_connected: bool,
}

#[derive(Default)]
struct StatCounters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    l1_sets: AtomicU64,
    l2_sets: AtomicU64,
}

/// The two-tier manager: L1 first, then L2 with populate-on-hit.
pub struct CacheManager {
    l1: MemoryCache,
    l2: Option<RedisCache>,
    stats: StatCounters,
    enabled: bool,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        let l2 = match config.redis_url.as_deref() {
            Some(url) => match RedisCache::new(url, config.ttl_seconds) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!(error = %e, "invalid redis url, running with L1 only");
                    None
                }
            },
            None => None,
        };

        Self {
            l1: MemoryCache::new(config.l1_max_size, Duration::from_secs(config.ttl_seconds)),
            l2,
            stats: StatCounters::default(),
            enabled: config.enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub async fn get(&self, key: &str) -> Option<(CacheEntry, CacheTier)> {
        if !self.enabled {
            return None;
        }

        if let Some(entry) = self.l1.get(key).await {
            self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Some((entry, CacheTier::L1));
        }

        if let Some(l2) = &self.l2 {
            match l2.get(key).await {
                Ok(Some(entry)) => {
                    self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
                    self.l1.set(key.to_string(), entry.clone()).await;
                    return Some((entry, CacheTier::L2));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, key = key, "L2 cache get failed");
                    l2.drop_connection().await;
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write-through to both tiers. L1 always succeeds; L2 failures are
    /// logged and swallowed.
    pub async fn set(&self, key: &str, entry: CacheEntry) {
        if !self.enabled {
            return;
        }

        self.l1.set(key.to_string(), entry.clone()).await;
        self.stats.l1_sets.fetch_add(1, Ordering::Relaxed);

        if let Some(l2) = &self.l2 {
            match l2.set(key, &entry).await {
                Ok(()) => {
                    self.stats.l2_sets.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = key, "L2 cache set failed");
                    l2.drop_connection().await;
                }
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.l1.remove(key).await;
        if let Some(l2) = &self.l2 {
            if let Err(e) = l2.remove(key).await {
                tracing::warn!(error = %e, key = key, "L2 cache invalidate failed");
                l2.drop_connection().await;
            }
        }
    }

    pub async fn clear_all(&self) {
        self.l1.clear().await;
        if let Some(l2) = &self.l2 {
            if let Err(e) = l2.clear_prefix().await {
                tracing::warn!(error = %e, "L2 cache clear failed");
                l2.drop_connection().await;
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let l1_hits = self.stats.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.stats.l2_hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let lookups = l1_hits + l2_hits + misses;
        let hit_rate_pct = if lookups > 0 {
            (l1_hits + l2_hits) as f64 / lookups as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            l1_hits,
            l2_hits,
            misses,
            l1_sets: self.stats.l1_sets.load(Ordering::Relaxed),
            l2_sets: self.stats.l2_sets.load(Ordering::Relaxed),
            hit_rate_pct,
            l1_size: self.l1.len().await,
            l1_max_size: self.l1.max_size,
            l2_connected: self.l2.as_ref().map(RedisCache::is_connected).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(text: &str) -> CacheEntry {
        CacheEntry {
            anonymized_text: text.to_string(),
            spans: Vec::new(),
            success: true,
            error_kind: None,
            error_message: None,
            processing_time_ms: 1,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_cache_key_format() {
        let key = cache_key("testo normalizzato", "presidio", "abcd1234");
        assert!(key.starts_with("privacy:doc:"));
        assert_eq!(key.len(), "privacy:doc:".len() + 16);
        assert!(key[KEY_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_cache_key_sensitivity() {
        let base = cache_key("testo", "presidio", "aaaa0000");
        assert_ne!(base, cache_key("testo ", "presidio", "aaaa0000"));
        assert_ne!(base, cache_key("testo", "spacy", "aaaa0000"));
        assert_ne!(base, cache_key("testo", "presidio", "aaaa0001"));
        assert_eq!(base, cache_key("testo", "presidio", "aaaa0000"));
    }

    #[test]
    fn test_config_hash_is_key_order_independent() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(config_hash(&a), config_hash(&b));
        assert_eq!(config_hash(&a).len(), 8);

        let c = json!({"a": 1, "b": 3});
        assert_ne!(config_hash(&a), config_hash(&c));
    }

    #[test]
    fn test_canonical_json_nested() {
        let value = json!({"z": {"b": [1, 2], "a": null}, "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","z":{"a":null,"b":[1,2]}}"#);
    }

    #[tokio::test]
    async fn test_l1_round_trip() {
        let manager = CacheManager::new(&CacheConfig::default());
        manager.set("privacy:doc:0000000000000001", entry("anon")).await;
        let (hit, tier) = manager.get("privacy:doc:0000000000000001").await.unwrap();
        assert_eq!(hit.anonymized_text, "anon");
        assert_eq!(tier, CacheTier::L1);
    }

    #[tokio::test]
    async fn test_miss_is_counted() {
        let manager = CacheManager::new(&CacheConfig::default());
        assert!(manager.get("privacy:doc:ffffffffffffffff").await.is_none());
        let stats = manager.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.l1_hits, 0);
        assert!(!stats.l2_connected);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let config = CacheConfig {
            l1_max_size: 2,
            ..Default::default()
        };
        let manager = CacheManager::new(&config);
        manager.set("k1", entry("1")).await;
        manager.set("k2", entry("2")).await;
        // Touch k1 so k2 becomes the least recently used.
        manager.get("k1").await.unwrap();
        manager.set("k3", entry("3")).await;

        assert!(manager.get("k1").await.is_some());
        assert!(manager.get("k2").await.is_none());
        assert!(manager.get("k3").await.is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let config = CacheConfig {
            ttl_seconds: 0,
            ..Default::default()
        };
        let manager = CacheManager::new(&config);
        manager.set("k", entry("v")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(manager.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let manager = CacheManager::new(&CacheConfig::default());
        manager.set("k1", entry("1")).await;
        manager.set("k2", entry("2")).await;

        manager.invalidate("k1").await;
        assert!(manager.get("k1").await.is_none());
        assert!(manager.get("k2").await.is_some());

        manager.clear_all().await;
        assert!(manager.get("k2").await.is_none());
        assert_eq!(manager.stats().await.l1_size, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let manager = CacheManager::new(&config);
        manager.set("k", entry("v")).await;
        assert!(manager.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_l2_degrades_to_l1() {
        let config = CacheConfig {
            redis_url: Some("redis://127.0.0.1:1/".to_string()),
            ..Default::default()
        };
        let manager = CacheManager::new(&config);
        manager.set("k", entry("v")).await;
        let (hit, tier) = manager.get("k").await.unwrap();
        assert_eq!(hit.anonymized_text, "v");
        assert_eq!(tier, CacheTier::L1);
        assert!(!manager.stats().await.l2_connected);
    }
}
