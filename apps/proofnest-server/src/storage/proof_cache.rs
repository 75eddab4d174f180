// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! LRU cache for the "recent proofs" first page.
//!
//! The dashboard asks for a user's newest proofs on every load; caching that
//! page avoids repeated redb scans. Entries are invalidated on every write
//! that touches the user's proofs.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::StoredProof;

struct CacheEntry {
    proofs: Vec<StoredProof>,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by user id.
pub struct ProofCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ProofCache {
    /// - `capacity`: max number of users cached.
    /// - `ttl`: time-to-live for each entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Cached recent proofs for a user, `None` if absent or expired.
    pub fn get_recent(&self, user_id: &str) -> Option<Vec<StoredProof>> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(user_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.proofs.clone());
            }
            cache.pop(user_id);
        }
        None
    }

    pub fn put_recent(&self, user_id: &str, proofs: Vec<StoredProof>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                user_id.to_string(),
                CacheEntry {
                    proofs,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, user_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<StoredProof> {
        vec![StoredProof::new_pending(
            "user-1",
            "note-1",
            &crate::hashing::fingerprint("cached"),
            "local",
            None,
        )]
    }

    #[test]
    fn cache_put_and_get() {
        let cache = ProofCache::new(10, Duration::from_secs(300));
        assert!(cache.get_recent("user-1").is_none());

        cache.put_recent("user-1", sample());
        let result = cache.get_recent("user-1").unwrap();
        assert_eq!(result.len(), 1);
        assert!(cache.get_recent("user-2").is_none());
    }

    #[test]
    fn cache_invalidate() {
        let cache = ProofCache::new(10, Duration::from_secs(300));
        cache.put_recent("user-1", sample());
        cache.invalidate("user-1");
        assert!(cache.get_recent("user-1").is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = ProofCache::new(10, Duration::from_millis(1));
        cache.put_recent("user-1", sample());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_recent("user-1").is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = ProofCache::new(1, Duration::from_secs(300));
        cache.put_recent("a", sample());
        cache.put_recent("b", sample());
        assert!(cache.get_recent("a").is_none());
        assert!(cache.get_recent("b").is_some());
    }
}
