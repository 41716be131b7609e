/*!
 * Artifact cache schema.
 *
 * `translation_cache` holds translated paragraph text and `audio_cache`
 * references generated audio files. Rows are keyed by the encoded cache key;
 * the decoded document id and paragraph index are stored alongside so a
 * document can be listed or cleared without parsing keys.
 *
 * The schema version lives in SQLite's `user_version` pragma. Each entry of
 * `MIGRATIONS` upgrades the schema by one version.
 */

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // v1
    r#"
    CREATE TABLE IF NOT EXISTS translation_cache (
        cache_key TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        paragraph_index INTEGER NOT NULL,
        language TEXT NOT NULL,
        translated_text TEXT NOT NULL,
        provider TEXT NOT NULL,
        model TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_translation_document ON translation_cache(document_id, paragraph_index);

    CREATE TABLE IF NOT EXISTS audio_cache (
        cache_key TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        paragraph_index INTEGER NOT NULL,
        voice TEXT NOT NULL,
        model TEXT NOT NULL,
        file_name TEXT NOT NULL,
        byte_len INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audio_document ON audio_cache(document_id, paragraph_index);
    "#,
];

/// Version a fully migrated database reports
pub fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

/// Bring the schema up to date, applying pending migrations in order
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;
    let target = schema_version();

    if current > target {
        bail!(
            "Artifact cache was written by a newer version (schema v{}, supported v{})",
            current,
            target
        );
    }
    if current == target {
        debug!("Artifact cache schema is up to date (v{})", current);
        return Ok(());
    }

    // WAL lets readers proceed while another connection writes
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    for (step, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = step as i32 + 1;
        conn.execute_batch(&format!("BEGIN;\n{}\nPRAGMA user_version = {};\nCOMMIT;", sql, version))
            .with_context(|| format!("Failed to migrate artifact cache to schema v{}", version))?;
        info!("Artifact cache schema migrated to v{}", version);
    }
    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read artifact cache schema version")
}
