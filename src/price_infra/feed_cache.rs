use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::observability::metrics::{CACHE_FETCH_FAILURES, CACHE_HITS, CACHE_MISSES};

/// A downloaded bulk payload. Replaced wholesale, never patched.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Arc<Vec<u8>>,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

#[derive(Default)]
struct KeySlot {
    /// Completed fetch attempts. Lets a waiter tell that the fetch it queued
    /// behind has finished, so it can share that outcome.
    attempts: AtomicU64,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    entry: Option<CacheEntry>,
    last_error: Option<String>,
}

/// Bulk-Feed Cache - TTL cache for expensive downloads with per-key single-flight
///
/// ## Semantics
/// - **Hit**: a live entry is returned without calling the fetcher
/// - **Miss**: exactly one fetcher runs per key; concurrent callers wait on
///   the per-key lock and share its outcome, success or failure
/// - **Failure**: nothing is stored; the previous (expired) entry is left in
///   place and the next access refetches
/// - **Isolation**: each key has its own lock, unrelated feeds never contend
#[derive(Default)]
pub struct FeedCache {
    slots: DashMap<String, Arc<KeySlot>>,
}

impl FeedCache {
    pub fn new() -> Self {
        FeedCache {
            slots: DashMap::new(),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<Arc<Vec<u8>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let slot = self.slot(key);
        let observed = slot.attempts.load(Ordering::SeqCst);
        let mut state = slot.state.lock().await;

        if let Some(entry) = state.entry.as_ref().filter(|e| e.is_live(Instant::now())) {
            CACHE_HITS.inc();
            tracing::debug!("Bulk feed cache hit: {}", key);
            return Ok(Arc::clone(&entry.payload));
        }

        // A fetch finished while we were queued and it failed: share the failure
        if slot.attempts.load(Ordering::SeqCst) != observed {
            if let Some(reason) = &state.last_error {
                return Err(Error::CacheFetchFailed {
                    key: key.to_string(),
                    reason: reason.clone(),
                });
            }
        }

        CACHE_MISSES.inc();
        tracing::info!("Bulk feed cache miss, downloading: {}", key);

        let outcome = fetcher().await;
        slot.attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(bytes) => {
                let payload = Arc::new(bytes);
                state.entry = Some(CacheEntry {
                    key: key.to_string(),
                    payload: Arc::clone(&payload),
                    stored_at: Instant::now(),
                    ttl,
                });
                state.last_error = None;
                Ok(payload)
            }
            Err(e) => {
                CACHE_FETCH_FAILURES.inc();
                tracing::warn!("Bulk feed download failed for {}: {}", key, e);
                let reason = e.to_string();
                state.last_error = Some(reason.clone());
                Err(Error::CacheFetchFailed {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }

    /// Drops the entry for `key`; the next access refetches.
    pub async fn invalidate(&self, key: &str) {
        if let Some(slot) = self.slots.get(key).map(|s| Arc::clone(s.value())) {
            slot.state.lock().await.entry = None;
        }
    }

    /// Number of keys ever seen.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &str) -> Arc<KeySlot> {
        Arc::clone(self.slots.entry(key.to_string()).or_default().value())
    }
}
