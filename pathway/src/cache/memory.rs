use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::PersistentCache;
use crate::errors::{PathwayError, PathwayResult};
use crate::value::Value;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// In-process cache with an optional time-to-live.
///
/// Cloning shares the underlying slot, so a test can keep one clone to seed
/// or inspect the entry while the node owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slot: Arc<Mutex<Option<Entry>>>,
    ttl: Option<Duration>,
    updates: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Seed the slot without counting as an update.
    pub fn seeded(value: Value) -> Self {
        let cache = Self::new();
        *cache.slot.lock() = Some(Entry {
            value,
            expires_at: None,
        });
        cache
    }

    /// Current value, ignoring expiry.
    pub fn peek(&self) -> Option<Value> {
        self.slot.lock().as_ref().map(|entry| entry.value.clone())
    }

    /// Number of `update` calls received.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PersistentCache for MemoryCache {
    async fn fetch(&self) -> PathwayResult<Value> {
        let mut slot = self.slot.lock();
        let entry = slot
            .clone()
            .ok_or_else(|| PathwayError::Cache("empty".into()))?;
        if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
            *slot = None;
            return Err(PathwayError::Cache("expired".into()));
        }
        Ok(entry.value)
    }

    async fn update(&self, value: &Value) -> PathwayResult<()> {
        *self.slot.lock() = Some(Entry {
            value: value.clone(),
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        });
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn empty(&self) -> PathwayResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_empty_is_miss() {
        let cache = MemoryCache::new();
        assert!(cache.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_update_then_fetch() {
        let cache = MemoryCache::new();
        cache.update(&json!({"token": "abc"})).await.unwrap();
        assert_eq!(cache.fetch().await.unwrap(), json!({"token": "abc"}));
        assert_eq!(cache.update_count(), 1);

        cache.empty().await.unwrap();
        assert!(cache.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(0));
        cache.update(&json!(1)).await.unwrap();
        assert!(cache.fetch().await.is_err());
        assert!(cache.peek().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_slot() {
        let cache = MemoryCache::seeded(json!(3));
        let other = cache.clone();
        other.update(&json!(4)).await.unwrap();
        assert_eq!(cache.peek(), Some(json!(4)));
    }
}
