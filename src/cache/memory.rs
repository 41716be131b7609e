/*!
 * In-memory artifact store.
 *
 * Used by tests and by sessions started without persistence. Clones share
 * the same underlying map.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;

use super::{check_kind, Artifact, ArtifactStore, CacheKey, CacheStats, KeyKind, PutOutcome};
use crate::errors::StoreError;

/// Artifact store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Artifact>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn write(&self, key: &CacheKey, artifact: &Artifact, force: bool) -> Result<PutOutcome, StoreError> {
        check_kind(key, artifact)?;

        // One write guard covers the compare and the replace
        let mut entries = self.entries.write();
        let outcome = match entries.get(key.as_str()) {
            Some(existing) if !force && existing.same_content(artifact) => return Ok(PutOutcome::Unchanged),
            Some(_) => PutOutcome::Overwritten,
            None => PutOutcome::Inserted,
        };
        entries.insert(key.as_str().to_string(), artifact.clone());
        Ok(outcome)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, StoreError> {
        let found = self.entries.read().get(key.as_str()).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Memory cache hit for {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Memory cache miss for {}", key);
        }
        Ok(found)
    }

    async fn put(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError> {
        self.write(key, artifact, false)
    }

    async fn replace(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError> {
        self.write(key, artifact, true)
    }

    async fn has(&self, key: &CacheKey) -> Result<bool, StoreError> {
        Ok(self.entries.read().contains_key(key.as_str()))
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, StoreError> {
        Ok(self.entries.write().remove(key.as_str()).is_some())
    }

    async fn stats(&self) -> Result<CacheStats, StoreError> {
        let entries = self.entries.read();
        let audio_entries = entries
            .values()
            .filter(|artifact| artifact.kind() == KeyKind::Audio)
            .count() as u64;

        Ok(CacheStats {
            translation_entries: entries.len() as u64 - audio_entries,
            audio_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut entries = self.entries.write();
        let removed = entries.len() as u64;
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Memory cache cleared");
        Ok(removed)
    }
}
