//! Cache for responses of read-style sync webhooks.
//!
//! Entries are keyed by a fingerprint of what was sent and where, so the
//! read path and the invalidation path derive the same key independently.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::models::WebhookEventSyncType;

/// Key-value store with per-entry timeouts. Each call is atomic on its own;
/// there are no multi-call transactions.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, timeout: Duration);

    /// Removing an absent key is a no-op.
    fn delete(&self, key: &str);
}

/// Deterministic cache key for a webhook response.
pub fn generate_cache_key_for_webhook(
    payload: &Value,
    target_url: &str,
    event_type: WebhookEventSyncType,
    app_id: i64,
) -> String {
    let material = json!({
        "payload": payload,
        "target_url": target_url,
        "event": event_type.as_str(),
        "app_id": app_id,
    });

    let mut hasher = Sha256::new();
    hasher.update(material.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Entry count below which `set` never sweeps.
const SWEEP_THRESHOLD: usize = 64;

/// Process-local cache.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Entries>,
}

#[derive(Default)]
struct Entries {
    /// `None` expiry means the timeout did not fit in an `Instant`.
    map: HashMap<String, (Value, Option<Instant>)>,
    /// Map size that triggers the next sweep of expired entries.
    sweep_at: usize,
}

impl Entries {
    fn sweep(&mut self, now: Instant) {
        self.map.retain(|_, (_, expires_at)| !is_expired(*expires_at, now));
        self.sweep_at = (self.map.len() * 2).max(SWEEP_THRESHOLD);
    }
}

fn is_expired(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.is_some_and(|at| at <= now)
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        // A panic while holding the lock leaves the map itself intact.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        match entries.map.get(key) {
            Some((value, expires_at)) if !is_expired(*expires_at, Instant::now()) => {
                Some(value.clone())
            }
            Some(_) => {
                entries.map.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, timeout: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        if entries.map.len() >= entries.sweep_at.max(SWEEP_THRESHOLD) {
            entries.sweep(now);
        }
        entries
            .map
            .insert(key.to_string(), (value, now.checked_add(timeout)));
    }

    fn delete(&self, key: &str) {
        self.lock().map.remove(key);
    }
}
