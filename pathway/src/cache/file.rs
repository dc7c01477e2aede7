use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::PersistentCache;
use crate::errors::{PathwayError, PathwayResult};
use crate::value::Value;

/// On-disk representation of a cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
    written_at: DateTime<Utc>,
}

/// Disk-backed cache storing one JSON envelope per node.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves either the old entry or the new one.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    ttl: Option<Duration>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: None,
        }
    }

    /// Cache file under `dir` named after the SHA-256 of `key`.
    pub fn for_key(dir: &Path, key: &str) -> Self {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        Self::new(dir.join(format!("{}.json", digest)))
    }

    /// Cache file under the user's cache directory.
    pub fn in_default_dir(key: &str) -> PathwayResult<Self> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| PathwayError::Cache("no user cache directory".into()))?
            .join("pathway");
        Ok(Self::for_key(&dir, key))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn expiry(&self, now: DateTime<Utc>) -> PathwayResult<Option<DateTime<Utc>>> {
        match self.ttl {
            None => Ok(None),
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| PathwayError::Cache(format!("invalid ttl: {}", e)))?;
                Ok(Some(now + ttl))
            }
        }
    }
}

#[async_trait]
impl PersistentCache for FileCache {
    async fn fetch(&self) -> PathwayResult<Value> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            PathwayError::Cache(format!("read {}: {}", self.path.display(), e))
        })?;
        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| {
            PathwayError::Cache(format!("corrupt entry {}: {}", self.path.display(), e))
        })?;

        if let Some(expires_at) = envelope.expires_at {
            if expires_at <= Utc::now() {
                return Err(PathwayError::Cache(format!(
                    "entry {} expired at {}",
                    self.path.display(),
                    expires_at.to_rfc3339()
                )));
            }
        }

        Ok(envelope.value)
    }

    async fn update(&self, value: &Value) -> PathwayResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let now = Utc::now();
        let envelope = Envelope {
            value: value.clone(),
            expires_at: self.expiry(now)?,
            written_at: now,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::trace!(path = %self.path.display(), "Cache entry written");
        Ok(())
    }

    async fn empty(&self) -> PathwayResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
