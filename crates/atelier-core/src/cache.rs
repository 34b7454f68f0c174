use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Key-value store with per-entry expiry.
///
/// Mirrors the small subset of a framework cache the site needs: lookups,
/// existence checks and timed writes. `has` followed by `put` is not atomic;
/// callers that dedupe with it accept an occasional duplicate.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration);

    async fn forget(&self, key: &str);
}
