//! Resolution coordinator: at most one resolver invocation per key at a time.
//!
//! The first caller for a key that misses the cache becomes the leader. It
//! creates an in-flight slot for the key and spawns the invocation as a
//! detached task. Callers arriving while the slot exists are followers: they
//! subscribe to the same slot and receive the leader's result, success or
//! failure, without invoking the resolver themselves.
//!
//! Slot creation and leader election are one step, performed under the
//! shard lock of the slot map's `entry()` API. Results are published through
//! a `watch` channel, so a follower that subscribes after the result was sent
//! still observes it.
//!
//! The detached task always runs to completion. A leader whose client went
//! away does not strand its followers, and a successful result nobody waited
//! for still lands in the cache.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use yb_core::{Error, ResolutionKey, Result, StreamRecord};
use yb_resolver::Resolver;

use crate::cache::ResolutionCache;

type SharedResult = Option<Result<Arc<StreamRecord>>>;
type Slots = DashMap<ResolutionKey, watch::Receiver<SharedResult>>;

/// Deduplicates concurrent resolutions and populates the cache.
pub struct Coordinator {
    resolver: Arc<dyn Resolver>,
    cache: Arc<ResolutionCache>,
    in_flight: Arc<Slots>,
}

impl Coordinator {
    pub fn new(resolver: Arc<dyn Resolver>, cache: Arc<ResolutionCache>) -> Self {
        Self {
            resolver,
            cache,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Number of resolutions currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Return the cached record for `key`, or resolve it, joining any
    /// resolution already running for the same key.
    pub async fn resolve_or_join(&self, key: &ResolutionKey) -> Result<Arc<StreamRecord>> {
        if let Some(record) = self.cache.get(key) {
            tracing::debug!(video_id = %key.video_id, selector = %key.selector, "cache hit");
            return Ok(record);
        }

        let (rx, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) => {
                tracing::debug!(video_id = %key.video_id, selector = %key.selector, "joining in-flight resolution");
                (slot.get().clone(), None)
            }
            Entry::Vacant(slot) => {
                // A leader may have finished between the cache miss above and
                // taking the shard lock; its record is in the cache by now.
                if let Some(record) = self.cache.get(key) {
                    return Ok(record);
                }
                let (tx, rx) = watch::channel(None);
                slot.insert(rx.clone());
                (rx, Some(tx))
            }
        };

        if let Some(tx) = leader {
            self.spawn_leader(key.clone(), tx);
        }

        wait_for_result(rx).await
    }

    /// Drop the cached record for `key` unconditionally.
    pub fn invalidate(&self, key: &ResolutionKey) -> bool {
        self.cache.invalidate(key)
    }

    /// Drop the cached record for `key` if it is still `stale`. A record
    /// that another request already refreshed is left alone.
    pub fn invalidate_stale(&self, key: &ResolutionKey, stale: &Arc<StreamRecord>) -> bool {
        self.cache.invalidate_if_same(key, stale)
    }

    fn spawn_leader(&self, key: ResolutionKey, tx: watch::Sender<SharedResult>) {
        let resolver = self.resolver.clone();
        let cache = self.cache.clone();
        let slot = SlotGuard {
            slots: self.in_flight.clone(),
            key: key.clone(),
        };

        tokio::spawn(async move {
            let started = Instant::now();
            tracing::info!(video_id = %key.video_id, selector = %key.selector, "resolving");

            let result = resolver
                .resolve(&key.video_id, &key.selector)
                .await
                .map(Arc::new);

            match &result {
                Ok(record) => {
                    cache.put(key.clone(), record.clone());
                    tracing::info!(
                        video_id = %key.video_id,
                        selector = %key.selector,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        expires_at = %record.expires_at,
                        "resolution cached"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        video_id = %key.video_id,
                        selector = %key.selector,
                        code = e.code(),
                        error = %e,
                        "resolution failed"
                    );
                }
            }

            // Cache first, then free the slot, then publish: a caller that
            // finds no slot is guaranteed to find the record.
            drop(slot);
            tx.send_replace(Some(result));
        });
    }
}

/// Removes the in-flight slot when dropped, including when the leader task
/// panics.
struct SlotGuard {
    slots: Arc<Slots>,
    key: ResolutionKey,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}

async fn wait_for_result(mut rx: watch::Receiver<SharedResult>) -> Result<Arc<StreamRecord>> {
    let published = rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| Error::Internal("resolution task ended without a result".into()))?;

    match &*published {
        Some(result) => result.clone(),
        None => Err(Error::Internal("resolution published no result".into())),
    }
}
