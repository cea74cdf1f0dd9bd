//! TTL disk cache for raw API responses
//!
//! One JSON file per request key. The file name is the SHA-256 of the key, the
//! body records when it was stored and for how long it stays valid.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    stored_at: DateTime<Utc>,
    ttl_secs: u64,
    payload: serde_json::Value,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = Duration::seconds(self.ttl_secs.min(u32::MAX as u64) as i64);
        now < self.stored_at + ttl
    }
}

/// File-backed response cache
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open (and create if needed) a cache directory
    pub fn open<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.json", name))
    }

    /// Fresh payload for `key`, if any
    ///
    /// Expired, unreadable or corrupt entries are treated as misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {:?}: {}", path, e);
                return None;
            }
        };

        if entry.key != key {
            warn!("Cache key mismatch in {:?}", path);
            return None;
        }
        if !entry.is_fresh(now) {
            debug!("Cache entry expired: {}", key);
            return None;
        }

        debug!("Cache hit: {}", key);
        Some(entry.payload)
    }

    /// Store a payload, replacing any previous entry atomically
    pub fn set(&self, key: &str, payload: &serde_json::Value, ttl_secs: u64) -> std::io::Result<()> {
        self.set_at(key, payload, ttl_secs, Utc::now())
    }

    fn set_at(
        &self,
        key: &str,
        payload: &serde_json::Value,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> std::io::Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            stored_at: now,
            ttl_secs,
            payload: payload.clone(),
        };
        let body = serde_json::to_vec(&entry)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&body)?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove every entry, returning how many files were deleted
    pub fn clear(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
