//! In-process resolution cache.
//!
//! Maps a [`ResolutionKey`] to the last [`StreamRecord`] resolved for it.
//! Expiry is decided at read time by comparing the record's `expires_at`
//! against the clock; reads never delete. Stale entries are swept by
//! [`ResolutionCache::purge_expired`], which a background task runs
//! periodically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use yb_core::{ResolutionKey, StreamRecord};

/// Key-sharded map of resolved streams.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<ResolutionKey, Arc<StreamRecord>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live record for `key`, if any.
    pub fn get(&self, key: &ResolutionKey) -> Option<Arc<StreamRecord>> {
        self.get_at(key, Utc::now())
    }

    /// The record for `key` if it is still live at `now`.
    pub fn get_at(&self, key: &ResolutionKey, now: DateTime<Utc>) -> Option<Arc<StreamRecord>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.value().clone())
    }

    /// Store a record, replacing whatever was there.
    pub fn put(&self, key: ResolutionKey, record: Arc<StreamRecord>) {
        self.entries.insert(key, record);
    }

    /// Remove the entry for `key` regardless of its expiry.
    pub fn invalidate(&self, key: &ResolutionKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove the entry for `key` only if it is still `stale`.
    ///
    /// Returns false when a newer record has already replaced it, so a late
    /// caller holding an old link does not evict a fresh resolution.
    pub fn invalidate_if_same(&self, key: &ResolutionKey, stale: &Arc<StreamRecord>) -> bool {
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, stale))
            .is_some()
    }

    /// Drop every entry that is expired at `now`. Returns how many went.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| record.is_live_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Number of stored entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
