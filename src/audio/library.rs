/*!
 * Local audio library.
 *
 * Generated audio lives under `<root>/<document id>/<deterministic name>`.
 * Files are written to `<name>.part` first and renamed into place, so a
 * reader never sees a truncated file under the final name.
 */

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use super::filename::{FileName, AUDIO_EXTENSION};
use crate::cache::key::escape_component;

/// Totals over the files in the library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryUsage {
    pub files: u64,
    pub bytes: u64,
}

/// Directory tree holding generated audio
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    root: PathBuf,
}

impl AudioLibrary {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one document's audio files
    ///
    /// The id is escaped like a cache key component, so it always names a
    /// single directory directly under the root.
    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(escape_component(document_id))
    }

    fn checked_document_dir(&self, document_id: &str) -> io::Result<PathBuf> {
        if document_id.trim().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "document id must not be empty",
            ));
        }
        Ok(self.document_dir(document_id))
    }

    /// Full path of a paragraph's audio file
    pub fn path_for(&self, document_id: &str, file_name: &FileName) -> PathBuf {
        self.document_dir(document_id).join(file_name.as_str())
    }

    /// Write `bytes` under `file_name`, replacing any previous file atomically
    pub async fn write(&self, document_id: &str, file_name: &FileName, bytes: &[u8]) -> io::Result<u64> {
        let dir = self.checked_document_dir(document_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let final_path = dir.join(file_name.as_str());
        let part_path = dir.join(file_name.partial());

        let mut file = tokio::fs::File::create(&part_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }

        info!("Wrote {} bytes of audio to {:?}", bytes.len(), final_path);
        Ok(bytes.len() as u64)
    }

    /// Delete a paragraph's audio file, returning whether it existed
    pub async fn remove(&self, document_id: &str, file_name: &FileName) -> io::Result<bool> {
        let path = self.checked_document_dir(document_id)?.join(file_name.as_str());
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete one document's audio, or the whole library when `document_id` is `None`
    pub fn clear(&self, document_id: Option<&str>) -> io::Result<LibraryUsage> {
        let target = match document_id {
            Some(id) => AudioLibrary::new(self.checked_document_dir(id)?),
            None => self.clone(),
        };
        let removed = target.usage();
        if target.root.exists() {
            std::fs::remove_dir_all(&target.root)?;
        }
        info!("Removed {} audio files from {:?}", removed.files, target.root);
        Ok(removed)
    }

    /// Count finished audio files (partial writes excluded)
    pub fn usage(&self) -> LibraryUsage {
        let mut usage = LibraryUsage::default();
        if !self.root.exists() {
            return usage;
        }

        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_audio = path
                .extension()
                .is_some_and(|ext| ext == AUDIO_EXTENSION);
            if entry.file_type().is_file() && is_audio {
                usage.files += 1;
                usage.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        debug!("Audio library {:?}: {} files, {} bytes", self.root, usage.files, usage.bytes);
        usage
    }
}
