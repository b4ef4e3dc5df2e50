// src/services/cache.rs
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::AnalysisResult;

pub const CACHE_TTL_SECS: i64 = 300;
pub const SWEEP_INTERVAL_SECS: u64 = 60;

struct CacheEntry {
    result: AnalysisResult,
    stored_at: DateTime<Utc>,
}

/// Process-lifetime store of finished analyses, one entry per ticker.
/// Constructed empty at startup and injected where needed; entries expire
/// after the TTL, lazily on lookup and proactively via the sweeper task.
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_ttl_secs(CACHE_TTL_SECS)
    }

    pub fn with_ttl_secs(secs: i64) -> Self {
        ResultCache {
            ttl: Duration::seconds(secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a live entry. Expired entries are removed on access and
    /// reported as absent.
    pub async fn get(&self, ticker: &str) -> Option<AnalysisResult> {
        let mut entries = self.entries.write().await;
        match entries.get(ticker) {
            Some(entry) if Utc::now() - entry.stored_at < self.ttl => {
                debug!("Cache hit for {}", ticker);
                Some(entry.result.clone())
            }
            Some(_) => {
                debug!("Cache entry for {} expired, evicting", ticker);
                entries.remove(ticker);
                None
            }
            None => None,
        }
    }

    /// Store a result, replacing any prior entry for the ticker and
    /// resetting its age. Empty-article results are stored like any other.
    pub async fn put(&self, ticker: &str, result: AnalysisResult) {
        let mut entries = self.entries.write().await;
        entries.insert(
            ticker.to_string(),
            CacheEntry {
                result,
                stored_at: Utc::now(),
            },
        );
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, entry| now - entry.stored_at < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Background eviction so stale entries don't sit around between lookups.
pub fn start_sweeper(cache: Arc<ResultCache>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        // The first tick fires immediately; skip it so a fresh cache isn't
        // swept at startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.sweep().await;
            if removed > 0 {
                info!("Cache sweep removed {} expired entries", removed);
            }
        }
    });
}
