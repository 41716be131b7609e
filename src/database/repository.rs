/*!
 * Repository layer for the persistent artifact cache.
 *
 * Implements `ArtifactStore` on top of SQLite. Each `put` runs inside one
 * transaction, so concurrent writers to the same key serialize on the
 * connection and readers never observe a half-written row. Lookups are
 * read-only; hit and miss counters live in process memory.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use crate::cache::{
    check_kind, Artifact, ArtifactStore, AudioEntry, CacheKey, CacheStats, KeyKind, PutOutcome,
    TranslationEntry,
};
use crate::errors::StoreError;

/// Repository for artifact cache operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Remove every entry belonging to one document
    pub async fn clear_document(&self, document_id: &str) -> Result<u64> {
        let document_id = document_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let translations = tx.execute(
                    "DELETE FROM translation_cache WHERE document_id = ?1",
                    [&document_id],
                )?;
                let audio = tx.execute(
                    "DELETE FROM audio_cache WHERE document_id = ?1",
                    [&document_id],
                )?;
                Ok((translations + audio) as u64)
            })
            .await
    }

    /// List the audio entries of a document, ordered by paragraph
    pub async fn audio_entries_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<(usize, AudioEntry)>> {
        let document_id = document_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT paragraph_index, file_name, byte_len, voice, model, created_at
                    FROM audio_cache
                    WHERE document_id = ?1
                    ORDER BY paragraph_index
                    "#,
                )?;

                let entries = stmt
                    .query_map([&document_id], |row| {
                        let index: i64 = row.get(0)?;
                        let byte_len: i64 = row.get(2)?;
                        Ok((
                            index as usize,
                            AudioEntry {
                                file_name: row.get(1)?,
                                byte_len: byte_len as u64,
                                voice: row.get(3)?,
                                model: row.get(4)?,
                                created_at: row.get(5)?,
                            },
                        ))
                    })?
                    .filter_map(|r| r.ok())
                    .collect();

                Ok(entries)
            })
            .await
    }

    fn read_translation(conn: &Connection, key: &str) -> Result<Option<TranslationEntry>> {
        let entry = conn
            .query_row(
                r#"
                SELECT translated_text, provider, model, created_at
                FROM translation_cache
                WHERE cache_key = ?1
                "#,
                [key],
                |row| {
                    Ok(TranslationEntry {
                        text: row.get(0)?,
                        provider: row.get(1)?,
                        model: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn read_audio(conn: &Connection, key: &str) -> Result<Option<AudioEntry>> {
        let entry = conn
            .query_row(
                r#"
                SELECT file_name, byte_len, voice, model, created_at
                FROM audio_cache
                WHERE cache_key = ?1
                "#,
                [key],
                |row| {
                    let byte_len: i64 = row.get(1)?;
                    Ok(AudioEntry {
                        file_name: row.get(0)?,
                        byte_len: byte_len as u64,
                        voice: row.get(2)?,
                        model: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    async fn write(&self, key: &CacheKey, artifact: &Artifact, force: bool) -> Result<PutOutcome, StoreError> {
        check_kind(key, artifact)?;

        let encoded = key.as_str().to_string();
        let document_id = key.document_id().to_string();
        let paragraph_index = key.paragraph_index() as i64;
        let components = key.components().to_vec();
        let artifact = artifact.clone();

        let outcome = self
            .db
            .transaction_async(move |tx| {
                let existing = Self::read_artifact(tx, artifact.kind(), &encoded)?;
                let outcome = match existing {
                    Some(existing) if !force && existing.same_content(&artifact) => {
                        return Ok(PutOutcome::Unchanged);
                    }
                    Some(_) => PutOutcome::Overwritten,
                    None => PutOutcome::Inserted,
                };

                match &artifact {
                    Artifact::Translation(entry) => {
                        let language = components.first().cloned().unwrap_or_default();
                        tx.execute(
                            r#"
                            INSERT INTO translation_cache (
                                cache_key, document_id, paragraph_index, language,
                                translated_text, provider, model, created_at
                            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                            ON CONFLICT(cache_key) DO UPDATE SET
                                translated_text = excluded.translated_text,
                                provider = excluded.provider,
                                model = excluded.model,
                                created_at = excluded.created_at
                            "#,
                            params![
                                encoded,
                                document_id,
                                paragraph_index,
                                language,
                                entry.text,
                                entry.provider,
                                entry.model,
                                entry.created_at,
                            ],
                        )?;
                    }
                    Artifact::Audio(entry) => {
                        tx.execute(
                            r#"
                            INSERT INTO audio_cache (
                                cache_key, document_id, paragraph_index, voice, model,
                                file_name, byte_len, created_at
                            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                            ON CONFLICT(cache_key) DO UPDATE SET
                                voice = excluded.voice,
                                model = excluded.model,
                                file_name = excluded.file_name,
                                byte_len = excluded.byte_len,
                                created_at = excluded.created_at
                            "#,
                            params![
                                encoded,
                                document_id,
                                paragraph_index,
                                entry.voice,
                                entry.model,
                                entry.file_name,
                                entry.byte_len as i64,
                                entry.created_at,
                            ],
                        )?;
                    }
                }

                Ok(outcome)
            })
            .await?;

        debug!("Stored {} ({:?}, forced: {})", key, outcome, force);
        Ok(outcome)
    }

    fn read_artifact(conn: &Connection, kind: KeyKind, key: &str) -> Result<Option<Artifact>> {
        Ok(match kind {
            KeyKind::Translation => Self::read_translation(conn, key)?.map(Artifact::Translation),
            KeyKind::Audio => Self::read_audio(conn, key)?.map(Artifact::Audio),
        })
    }
}

#[async_trait]
impl ArtifactStore for Repository {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, StoreError> {
        let kind = key.kind();
        let encoded = key.as_str().to_string();

        let found = self
            .db
            .execute_async(move |conn| Self::read_artifact(conn, kind, &encoded))
            .await?;

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss for {}", key);
        }
        Ok(found)
    }

    async fn put(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError> {
        self.write(key, artifact, false).await
    }

    async fn replace(&self, key: &CacheKey, artifact: &Artifact) -> Result<PutOutcome, StoreError> {
        self.write(key, artifact, true).await
    }

    async fn has(&self, key: &CacheKey) -> Result<bool, StoreError> {
        let table = table_for(key.kind());
        let encoded = key.as_str().to_string();

        let exists = self
            .db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE cache_key = ?1", table),
                    [&encoded],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, StoreError> {
        let table = table_for(key.kind());
        let encoded = key.as_str().to_string();

        let removed = self
            .db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    &format!("DELETE FROM {} WHERE cache_key = ?1", table),
                    [&encoded],
                )?;
                Ok(deleted > 0)
            })
            .await?;
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, StoreError> {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let stats = self
            .db
            .execute_async(move |conn| {
                let translation_entries: i64 =
                    conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?;
                let audio_entries: i64 =
                    conn.query_row("SELECT COUNT(*) FROM audio_cache", [], |row| row.get(0))?;

                Ok(CacheStats {
                    translation_entries: translation_entries as u64,
                    audio_entries: audio_entries as u64,
                    hits,
                    misses,
                })
            })
            .await?;
        Ok(stats)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let removed = self
            .db
            .transaction_async(|tx| {
                let translations = tx.execute("DELETE FROM translation_cache", [])?;
                let audio = tx.execute("DELETE FROM audio_cache", [])?;
                Ok((translations + audio) as u64)
            })
            .await?;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Artifact cache cleared ({} entries)", removed);
        Ok(removed)
    }
}

fn table_for(kind: KeyKind) -> &'static str {
    match kind {
        KeyKind::Translation => "translation_cache",
        KeyKind::Audio => "audio_cache",
    }
}
