//! Caller-owned memory of messages already labeled.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::debug;

use crate::classify::Classification;
use crate::config::BatchConfig;
use crate::error::Result;

/// A remembered classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub category: String,
    pub confidence: f64,
    pub classified_at: DateTime<Utc>,
}

/// Message id to assigned category, bounded by size and optionally by age.
///
/// Only successful, non-`other` classifications are recorded, so a message
/// that failed or fell back is tried again on the next run.
pub struct ClassificationCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Option<chrono::Duration>,
}

impl ClassificationCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl: None,
        }
    }

    /// Cache sized and aged by the `[batch]` settings.
    pub fn from_config(config: &BatchConfig) -> Result<Self> {
        let cache = Self::new(config.cache_capacity()?);
        Ok(match config.cache_ttl() {
            Some(ttl) => cache.with_ttl(ttl),
            None => cache,
        })
    }

    /// Expire entries older than `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX));
        self
    }

    /// Remember `classification` for `message_id` if it is a real label.
    ///
    /// Returns whether an entry was written.
    pub fn record(&mut self, message_id: &str, classification: &Classification) -> bool {
        self.record_at(message_id, classification, Utc::now())
    }

    fn record_at(&mut self, message_id: &str, classification: &Classification, now: DateTime<Utc>) -> bool {
        match classification {
            Classification::Labeled(result) if !classification.is_fallback() => {
                self.entries.put(
                    message_id.to_string(),
                    CacheEntry {
                        category: result.category.clone(),
                        confidence: result.confidence,
                        classified_at: now,
                    },
                );
                true
            }
            _ => false,
        }
    }

    /// Look up a live entry, evicting it if it has expired.
    pub fn get(&mut self, message_id: &str) -> Option<&CacheEntry> {
        self.get_at(message_id, Utc::now())
    }

    fn get_at(&mut self, message_id: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let expired = match (self.ttl, self.entries.peek(message_id)) {
            (Some(ttl), Some(entry)) => now.signed_duration_since(entry.classified_at) > ttl,
            _ => false,
        };
        if expired {
            debug!(message_id, "Cache entry expired");
            self.entries.pop(message_id);
            return None;
        }
        self.entries.get(message_id)
    }

    pub fn contains(&mut self, message_id: &str) -> bool {
        self.get(message_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
