/*!
 * Local audio probe.
 *
 * Checks, without blocking the caller, whether a paragraph's audio file is
 * already present and playable. Absence is an ordinary outcome: the probe
 * never returns an error.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncReadExt;

use super::filename::FileName;
use super::library::AudioLibrary;

/// Default bound on one probe attempt
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// A loaded reference to a local audio file, reusable for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    path: PathBuf,
    byte_len: u64,
}

impl AudioHandle {
    pub(crate) fn new(path: PathBuf, byte_len: u64) -> Self {
        Self { path, byte_len }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Read the whole file for playback
    pub async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Result of probing one filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present(AudioHandle),
    Absent,
}

impl ProbeOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Detector for locally named audio files
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Probe the audio file `file_name` of `document_id`
    async fn probe(&self, document_id: &str, file_name: &FileName) -> ProbeOutcome;
}

/// Probe backed by the local audio library
#[derive(Debug, Clone)]
pub struct FsAudioProbe {
    library: AudioLibrary,
    timeout: Duration,
}

impl FsAudioProbe {
    pub fn new(library: AudioLibrary) -> Self {
        Self {
            library,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn load(path: PathBuf) -> std::io::Result<Option<AudioHandle>> {
        let mut file = tokio::fs::File::open(&path).await?;
        let byte_len = file.metadata().await?.len();

        let mut header = [0u8; 4];
        let read = file.read(&mut header).await?;
        if !looks_like_mp3(&header[..read]) {
            return Ok(None);
        }

        Ok(Some(AudioHandle { path, byte_len }))
    }
}

#[async_trait]
impl AudioProbe for FsAudioProbe {
    async fn probe(&self, document_id: &str, file_name: &FileName) -> ProbeOutcome {
        let path = self.library.path_for(document_id, file_name);

        match tokio::time::timeout(self.timeout, Self::load(path.clone())).await {
            Ok(Ok(Some(handle))) => {
                debug!("Probe found local audio {:?} ({} bytes)", path, handle.byte_len);
                ProbeOutcome::Present(handle)
            }
            Ok(Ok(None)) => {
                debug!("Probe miss: {:?} is not playable audio", path);
                ProbeOutcome::Absent
            }
            Ok(Err(e)) => {
                debug!("Probe miss: {:?} ({})", path, e);
                ProbeOutcome::Absent
            }
            Err(_) => {
                debug!("Probe miss: {:?} timed out after {:?}", path, self.timeout);
                ProbeOutcome::Absent
            }
        }
    }
}

/// ID3v2 tag or an MPEG audio frame sync
fn looks_like_mp3(header: &[u8]) -> bool {
    match header {
        [b'I', b'D', b'3', ..] => true,
        [0xFF, second, ..] => second & 0xE0 == 0xE0,
        _ => false,
    }
}
