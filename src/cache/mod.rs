/*!
 * Artifact cache.
 *
 * This module defines the artifacts kept per paragraph, the identity keys
 * that address them, and the `ArtifactStore` trait implemented by the
 * in-memory store (`memory`) and the SQLite repository (`crate::database`).
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

pub mod key;
pub mod memory;

pub use self::key::{build_audio_key, build_translation_key, CacheKey, KeyKind};
pub use self::memory::MemoryStore;

/// A translated paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    /// Translated text
    pub text: String,
    /// Provider that produced the text (metadata, not identity)
    pub provider: String,
    /// Model that produced the text (metadata, not identity)
    pub model: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

impl TranslationEntry {
    pub fn new(text: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provider: provider.into(),
            model: model.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Reference to a paragraph's audio file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEntry {
    /// Deterministic file name inside the document's audio directory
    pub file_name: String,
    /// Size of the file when it was generated or detected
    pub byte_len: u64,
    pub voice: String,
    pub model: String,
    /// RFC 3339 generation (or detection) timestamp
    pub created_at: String,
}

impl AudioEntry {
    pub fn new(
        file_name: impl Into<String>,
        byte_len: u64,
        voice: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            byte_len,
            voice: voice.into(),
            model: model.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Anything the cache keeps for a paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Artifact {
    Translation(TranslationEntry),
    Audio(AudioEntry),
}

impl Artifact {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Translation(_) => KeyKind::Translation,
            Self::Audio(_) => KeyKind::Audio,
        }
    }

    /// Compare everything but the creation timestamp
    pub fn same_content(&self, other: &Artifact) -> bool {
        match (self, other) {
            (Self::Translation(a), Self::Translation(b)) => {
                a.text == b.text && a.provider == b.provider && a.model == b.model
            }
            (Self::Audio(a), Self::Audio(b)) => {
                a.file_name == b.file_name
                    && a.byte_len == b.byte_len
                    && a.voice == b.voice
                    && a.model == b.model
            }
            _ => false,
        }
    }

    pub fn as_translation(&self) -> Option<&TranslationEntry> {
        match self {
            Self::Translation(entry) => Some(entry),
            Self::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioEntry> {
        match self {
            Self::Audio(entry) => Some(entry),
            Self::Translation(_) => None,
        }
    }
}

/// Result of a `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// No entry existed for the key
    Inserted,
    /// The same content was already stored; nothing changed (never from `replace`)
    Unchanged,
    /// A different value was replaced (last writer wins)
    Overwritten,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub translation_entries: u64,
    pub audio_entries: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Translations: {}, Audio: {}, Hits: {}, Misses: {}, Hit rate: {:.1}%",
            self.translation_entries,
            self.audio_entries,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

/// Persistent key → artifact mapping
///
/// Implementations must make `put` atomic per key; readers may observe a
/// stale value but never a partially written one.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the artifact stored under `key`
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, StoreError>;

    /// Store `artifact` under `key`, replacing any different value
    async fn put(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError>;

    /// Store `artifact` under `key` even when the stored content is equal
    ///
    /// Never returns `Unchanged`; an existing entry is always `Overwritten`.
    async fn replace(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError>;

    /// Check whether an artifact exists for `key`
    async fn has(&self, key: &CacheKey) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove the entry for `key`, returning whether one existed
    async fn remove(&self, key: &CacheKey) -> Result<bool, StoreError>;

    /// Entry counts and hit statistics
    async fn stats(&self) -> Result<CacheStats, StoreError>;

    /// Remove every entry, returning how many were deleted
    async fn clear(&self) -> Result<u64, StoreError>;
}

/// Reject artifacts stored under a key of the other family
pub(crate) fn check_kind(key: &CacheKey, artifact: &Artifact) -> Result<(), StoreError> {
    if key.kind() != artifact.kind() {
        return Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("{} artifact stored under a {} key", artifact.kind(), key.kind()),
        });
    }
    Ok(())
}
