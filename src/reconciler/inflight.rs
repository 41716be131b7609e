/*!
 * In-flight request coalescing.
 *
 * At most one external request runs per key. Later callers for the same key
 * attach to the leader's shared future instead of starting another.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::cache::Artifact;
use crate::errors::ReconcileError;

use super::ServedFrom;

/// Outcome of one background fetch
#[derive(Debug, Clone)]
pub struct Fetched {
    pub artifact: Artifact,
    pub source: ServedFrom,
}

pub type SharedFetch = Shared<BoxFuture<'static, Result<Fetched, ReconcileError>>>;

/// Whether the caller started the request or joined an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Leader,
    Follower,
}

#[derive(Debug, Default)]
pub struct InflightMap {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, (u64, SharedFetch)>>,
}

impl InflightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the request running for `key`, or start one with `start`
    ///
    /// `start` runs under the map lock and must not block; it receives the
    /// id the entry is registered under.
    pub fn join_or_start<F>(&self, key: &str, start: F) -> (SharedFetch, Attachment)
    where
        F: FnOnce(u64) -> SharedFetch,
    {
        let mut entries = self.entries.lock();
        if let Some((_, shared)) = entries.get(key) {
            return (shared.clone(), Attachment::Follower);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = start(id);
        entries.insert(key.to_string(), (id, shared.clone()));
        (shared, Attachment::Leader)
    }

    /// Drop the entry for `key` if it is still the one registered as `id`
    pub fn remove(&self, key: &str, id: u64) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|(current, _)| *current == id) {
            entries.remove(key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
