/*!
 * SQLite connection handling.
 *
 * One connection per cache file, shared by every clone of the handle.
 * Queries run on the blocking pool so the async runtime never waits on disk.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::schema;

const DEFAULT_DB_FILENAME: &str = "artifacts.db";

/// Directory created under the platform's local data directory
pub const DEFAULT_DATA_DIRNAME: &str = "readalong";

/// Another process may hold the write lock while it stores an artifact
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const IN_MEMORY: &str = ":memory:";

#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open the cache file at `db_path`, creating it and its directory if needed
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)
            .with_context(|| format!("Failed to open artifact cache: {:?}", db_path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::initialize_schema(&conn)?;

        info!("Artifact cache ready at {:?}", db_path);
        Ok(Self::wrap(db_path, conn))
    }

    /// Private database that disappears with the handle
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        schema::initialize_schema(&conn)?;

        debug!("Created in-memory artifact cache");
        Ok(Self::wrap(PathBuf::from(IN_MEMORY), conn))
    }

    fn wrap(db_path: PathBuf, conn: Connection) -> Self {
        Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        }
    }

    /// Base directory for everything readalong keeps on disk
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .map(|base| base.join(DEFAULT_DATA_DIRNAME))
            .ok_or_else(|| anyhow!("Could not determine a data directory for the cache"))
    }

    pub fn default_database_path() -> Result<PathBuf> {
        Ok(Self::default_data_dir()?.join(DEFAULT_DB_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .context("Database task panicked")?
    }

    /// Run `f` in a transaction; nothing is committed if it returns an error
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .context("Database transaction task panicked")?
    }
}
