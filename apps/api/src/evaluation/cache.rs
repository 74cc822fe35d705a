//! Result Cache: content-addressed store for model-backed analyzer output.
//!
//! Slots are addressed by sha256(input digest + target id + schema version),
//! so a version bump moves every reader to fresh slots. Entries also carry the
//! version they were written under; a version mismatch, an expired TTL or a
//! cleared validity flag makes a read a miss, and the stale slot is evicted
//! right there. Redis eviction only deletes the exact payload that was read,
//! so a concurrent `put` is never lost. No background sweeper.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "admissions:eval";

/// Deletes KEYS[1] only while it still holds ARGV[1].
const EVICT_IF_UNCHANGED: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub target: String,
    pub schema_version: u32,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    pub valid: bool,
}

/// Freshness rules shared by every backend.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub schema_version: u32,
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(schema_version: u32, ttl: Duration) -> Self {
        Self {
            schema_version,
            ttl,
        }
    }

    pub fn is_servable(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.valid && entry.schema_version == self.schema_version && now - entry.stored_at < self.ttl
    }

    pub fn slot_key(&self, input_digest: &str, target: &str) -> String {
        slot_key(input_digest, target, self.schema_version)
    }

    fn entry(&self, key: String, target: &str, value: Value) -> CacheEntry {
        CacheEntry {
            key,
            target: target.to_string(),
            schema_version: self.schema_version,
            value,
            stored_at: Utc::now(),
            valid: true,
        }
    }
}

/// Hex sha256 of the input text with whitespace runs collapsed, so prompt
/// reformatting alone never splits the cache.
pub fn input_digest(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage key for an (input digest, target, schema version) slot.
pub fn slot_key(input_digest: &str, target: &str, schema_version: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input_digest.as_bytes());
    hasher.update([0x1f]);
    hasher.update(target.as_bytes());
    hasher.update([0x1f]);
    hasher.update(schema_version.to_be_bytes());
    format!("{KEY_PREFIX}:{:x}", hasher.finalize())
}

/// Shared store used concurrently by all analyzer tasks. Per-slot writes are
/// single operations; last writer wins.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, input_digest: &str, target: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&self, input_digest: &str, target: &str, value: Value) -> Result<(), CacheError>;

    /// Marks a slot unusable (e.g. its payload failed a shape check).
    async fn invalidate(&self, input_digest: &str, target: &str) -> Result<(), CacheError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-process backend
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
}

impl MemoryResultCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn insert_entry(&self, entry: CacheEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn get(&self, input_digest: &str, target: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return Ok(None),
                Some(entry) if self.policy.is_servable(entry, now) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        // Lazy eviction: re-check under the write lock in case a fresh put landed.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(&key) {
            if !self.policy.is_servable(entry, now) {
                debug!("Evicting stale cache slot {key} for {target}");
                entries.remove(&key);
            }
        }
        Ok(None)
    }

    async fn put(&self, input_digest: &str, target: &str, value: Value) -> Result<(), CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        let entry = self.policy.entry(key.clone(), target, value);
        self.entries.write().await.insert(key, entry);
        Ok(())
    }

    async fn invalidate(&self, input_digest: &str, target: &str) -> Result<(), CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        if let Some(entry) = self.entries.write().await.get_mut(&key) {
            entry.valid = false;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis backend
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisResultCache {
    client: redis::Client,
    policy: CachePolicy,
    evict: redis::Script,
}

impl RedisResultCache {
    pub fn new(client: redis::Client, policy: CachePolicy) -> Self {
        Self {
            client,
            policy,
            evict: redis::Script::new(EVICT_IF_UNCHANGED),
        }
    }
}

#[async_trait]
impl ResultCache for RedisResultCache {
    async fn get(&self, input_digest: &str, target: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(&key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let servable = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if self.policy.is_servable(&entry, Utc::now()) => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!("Undecodable cache slot {key}: {e}");
                None
            }
        };

        if servable.is_none() {
            let removed: i64 = self
                .evict
                .key(&key)
                .arg(&raw)
                .invoke_async(&mut conn)
                .await?;
            debug!("Stale cache slot {key} for {target}: evicted {removed}");
        }
        Ok(servable)
    }

    async fn put(&self, input_digest: &str, target: &str, value: Value) -> Result<(), CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        let entry = self.policy.entry(key.clone(), target, value);
        let payload = serde_json::to_string(&entry)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(&key, payload).await?;
        Ok(())
    }

    async fn invalidate(&self, input_digest: &str, target: &str) -> Result<(), CacheError> {
        let key = self.policy.slot_key(input_digest, target);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> CachePolicy {
        CachePolicy::new(3, Duration::days(7))
    }

    #[test]
    fn test_input_digest_ignores_whitespace_layout() {
        assert_eq!(
            input_digest("score  the\napplicant"),
            input_digest(" score the applicant ")
        );
        assert_ne!(input_digest("score a"), input_digest("score b"));
    }

    #[test]
    fn test_slot_key_depends_on_target() {
        let digest = input_digest("payload");
        assert_ne!(
            slot_key(&digest, "academic_excellence", 3),
            slot_key(&digest, "community_impact", 3)
        );
        assert!(slot_key(&digest, "x", 3).starts_with(KEY_PREFIX));
    }

    #[test]
    fn test_slot_key_depends_on_schema_version() {
        let digest = input_digest("payload");
        assert_ne!(
            slot_key(&digest, "academic_excellence", 3),
            slot_key(&digest, "academic_excellence", 4)
        );
        assert_eq!(
            policy().slot_key(&digest, "academic_excellence"),
            slot_key(&digest, "academic_excellence", 3)
        );
    }

    #[tokio::test]
    async fn test_version_bump_misses_old_slots() {
        let digest = input_digest("payload");
        let old = MemoryResultCache::new(policy());
        old.put(&digest, "community_impact", json!({"score": 6.0}))
            .await
            .unwrap();
        let entry = old.get(&digest, "community_impact").await.unwrap().unwrap();

        let bumped = MemoryResultCache::new(CachePolicy::new(4, Duration::days(7)));
        bumped.insert_entry(entry).await;
        assert!(bumped.get(&digest, "community_impact").await.unwrap().is_none());
        assert_eq!(bumped.len().await, 1);
    }

    #[test]
    fn test_redis_eviction_compares_before_delete() {
        let get = EVICT_IF_UNCHANGED.find("GET").unwrap();
        let del = EVICT_IF_UNCHANGED.find("DEL").unwrap();
        assert!(get < del);
        assert!(EVICT_IF_UNCHANGED.contains("== ARGV[1]"));
        assert!(EVICT_IF_UNCHANGED.contains("return 0"));
    }

    #[tokio::test]
    async fn test_get_twice_returns_identical_entries() {
        let cache = MemoryResultCache::new(policy());
        let digest = input_digest("payload");
        cache
            .put(&digest, "academic_excellence", json!({"score": 7.5}))
            .await
            .unwrap();

        let first = cache.get(&digest, "academic_excellence").await.unwrap();
        let second = cache.get(&digest, "academic_excellence").await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_miss_on_unknown_slot() {
        let cache = MemoryResultCache::new(policy());
        assert!(cache.get("nope", "academic_excellence").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_miss_and_evicted() {
        let cache = MemoryResultCache::new(policy());
        let digest = input_digest("payload");
        // Stored under the current key but stamped with an older version.
        let key = slot_key(&digest, "leadership_initiative", 3);
        cache
            .insert_entry(CacheEntry {
                key,
                target: "leadership_initiative".to_string(),
                schema_version: 2,
                value: json!({}),
                stored_at: Utc::now(),
                valid: true,
            })
            .await;

        assert!(cache
            .get(&digest, "leadership_initiative")
            .await
            .unwrap()
            .is_none());
        assert_eq!(cache.len().await, 0);

        // The next put overwrites the slot under the current version.
        cache
            .put(&digest, "leadership_initiative", json!({"ok": true}))
            .await
            .unwrap();
        let entry = cache
            .get(&digest, "leadership_initiative")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.schema_version, 3);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let cache = MemoryResultCache::new(policy());
        let digest = input_digest("payload");
        cache
            .insert_entry(CacheEntry {
                key: slot_key(&digest, "future_readiness", 3),
                target: "future_readiness".to_string(),
                schema_version: 3,
                value: json!({}),
                stored_at: Utc::now() - Duration::days(8),
                valid: true,
            })
            .await;

        assert!(cache.get(&digest, "future_readiness").await.unwrap().is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_turns_hit_into_miss() {
        let cache = MemoryResultCache::new(policy());
        let digest = input_digest("payload");
        cache
            .put(&digest, "community_impact", json!({"score": 6.0}))
            .await
            .unwrap();
        cache.invalidate(&digest, "community_impact").await.unwrap();
        assert!(cache.get(&digest, "community_impact").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_complete_entry() {
        let cache = std::sync::Arc::new(MemoryResultCache::new(policy()));
        let digest = input_digest("payload");
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            let digest = digest.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .put(&digest, "authenticity_voice", json!({ "writer": i }))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let entry = cache
            .get(&digest, "authenticity_voice")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.value.get("writer").is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_policy_servable_rules() {
        let policy = policy();
        let now = Utc::now();
        let fresh = policy.entry("k".to_string(), "t", json!(null));
        assert!(policy.is_servable(&fresh, now));

        let mut invalid = fresh.clone();
        invalid.valid = false;
        assert!(!policy.is_servable(&invalid, now));

        let mut old = fresh.clone();
        old.stored_at = now - Duration::days(7);
        assert!(!policy.is_servable(&old, now));
    }
}
