//! Persistent per-node caches.
//!
//! A cache handle belongs to exactly one node. It outlives the process and is
//! the only state the healing controller treats as untrustworthy:
//! - `fetch` returns the stored value; any error means "not cached"
//! - `update` persists a freshly computed, validated value
//! - `empty` clears the entry
//!
//! Two stores are provided: [`MemoryCache`] for in-process use and tests, and
//! [`FileCache`] for disk-backed persistence.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use async_trait::async_trait;

use crate::errors::PathwayResult;
use crate::value::Value;

/// Pluggable cache contract supplied by collaborators.
#[async_trait]
pub trait PersistentCache: Send + Sync {
    /// Fetch the cached value. Absent or expired entries are errors.
    async fn fetch(&self) -> PathwayResult<Value>;

    /// Persist a value.
    async fn update(&self, value: &Value) -> PathwayResult<()>;

    /// Clear the entry.
    async fn empty(&self) -> PathwayResult<()>;

    /// Human-readable description for logging.
    fn describe(&self) -> String {
        "cache".to_string()
    }
}
