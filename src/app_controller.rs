use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{parse_http_url, Config, TranslationProvider};
use crate::audio::library::LibraryUsage;
use crate::audio::{AudioLibrary, FsAudioProbe};
use crate::cache::{ArtifactStore, AudioEntry, CacheStats, MemoryStore};
use crate::database::{DatabaseConnection, Repository};
use crate::document::Document;
use crate::providers::anthropic::Anthropic;
use crate::providers::openai::OpenAI;
use crate::providers::speech::TtsAdapter;
use crate::providers::{SpeechSynthesizer, Translator};
use crate::reconciler::{Reconciler, SpeechSelection};
use crate::session::ReaderSession;

// @module: Application controller wiring configuration to the reconciler

/// Cache store selected by the storage settings
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Repository),
    Memory(MemoryStore),
}

impl StoreBackend {
    pub fn as_store(&self) -> Arc<dyn ArtifactStore> {
        match self {
            Self::Sqlite(repo) => Arc::new(repo.clone()),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }

    /// Remove one document's entries, or every entry
    pub async fn clear(&self, document_id: Option<&str>) -> Result<u64> {
        match (self, document_id) {
            (Self::Sqlite(repo), Some(id)) => repo.clear_document(id).await,
            (Self::Memory(_), Some(_)) => Err(anyhow!("Clearing a single document needs the persistent store")),
            (backend, None) => Ok(backend.as_store().clear().await?),
        }
    }
}

/// Main application controller for reader sessions
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Cache store shared by every session
    backend: StoreBackend,
    // @field: Generated audio
    library: AudioLibrary,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let backend = if config.storage.persist {
            let path = config.storage.resolved_database_path()?;
            debug!("Opening cache database at {:?}", path);
            StoreBackend::Sqlite(Repository::new(DatabaseConnection::new(&path)?))
        } else {
            info!("Persistence disabled; using an in-memory cache");
            StoreBackend::Memory(MemoryStore::new())
        };
        let library = AudioLibrary::new(config.storage.resolved_audio_dir()?);

        Ok(Self {
            config,
            backend,
            library,
        })
    }

    /// Controller over explicit parts (used by tests)
    pub fn with_parts(config: Config, backend: StoreBackend, library: AudioLibrary) -> Self {
        Self {
            config,
            backend,
            library,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn library(&self) -> &AudioLibrary {
        &self.library
    }

    /// Build the configured translation provider
    pub fn build_translator(&self) -> Arc<dyn Translator> {
        let translation = &self.config.translation;
        let timeout = Duration::from_secs(translation.timeout_secs);

        match translation.provider {
            TranslationProvider::OpenAI => Arc::new(
                OpenAI::new(&translation.api_key, translation.get_endpoint(), translation.get_model())
                    .with_system_prompt(&translation.system_prompt)
                    .with_timeout(timeout),
            ),
            TranslationProvider::Anthropic => Arc::new(
                Anthropic::new(&translation.api_key, translation.get_endpoint(), translation.get_model())
                    .with_system_prompt(&translation.system_prompt)
                    .with_timeout(timeout),
            ),
        }
    }

    /// Build the speech adapter for the configured route
    pub fn build_speech_adapter(&self) -> Result<TtsAdapter> {
        let speech = &self.config.speech;
        let direct = parse_http_url(&speech.endpoint, "speech endpoint")?;

        let mut adapter = TtsAdapter::new(self.config.speech_api_key(), direct)
            .with_timeout(Duration::from_secs(speech.timeout_secs));
        if speech.proxy.enabled {
            let proxy = parse_http_url(&speech.proxy.base_url, "proxy base URL")?;
            adapter = adapter.with_proxy(proxy);
        }
        info!("Speech requests use the {} route", adapter.route());
        Ok(adapter)
    }

    /// Build a reconciler from configuration
    pub fn build_reconciler(&self) -> Result<Reconciler> {
        let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(self.build_speech_adapter()?);
        Ok(self.reconciler_with(self.build_translator(), synthesizer))
    }

    /// Build a reconciler over explicit providers
    pub fn reconciler_with(&self, translator: Arc<dyn Translator>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Reconciler {
        let probe = FsAudioProbe::new(self.library.clone())
            .with_timeout(Duration::from_millis(self.config.storage.probe_timeout_ms));

        Reconciler::new(
            self.backend.as_store(),
            translator,
            synthesizer,
            Arc::new(probe),
            self.library.clone(),
            SpeechSelection::new(&self.config.speech.voice, &self.config.speech.model),
        )
    }

    /// Load a plain-text book and open a session over it
    pub fn open_session<P: AsRef<Path>>(&self, path: P, reconciler: Reconciler) -> Result<ReaderSession> {
        let path = path.as_ref();
        let document = Document::load_plain_text(path)?;
        if document.is_empty() {
            return Err(anyhow!("No paragraphs found in {:?}", path));
        }

        let session = ReaderSession::new(document, reconciler, &self.config.target_language)
            .context("Failed to open reader session")?
            .with_reconcile_concurrency(self.config.storage.reconcile_concurrency);
        Ok(session)
    }

    /// Cache and audio library totals
    pub async fn cache_stats(&self) -> Result<(CacheStats, LibraryUsage)> {
        let stats = self.backend.as_store().stats().await?;
        Ok((stats, self.library.usage()))
    }

    /// Audio entries recorded for one document
    pub async fn audio_entries(&self, document_id: &str) -> Result<Vec<(usize, AudioEntry)>> {
        match &self.backend {
            StoreBackend::Sqlite(repo) => repo.audio_entries_for_document(document_id).await,
            StoreBackend::Memory(_) => Err(anyhow!("Listing entries needs the persistent store")),
        }
    }

    /// Clear cached entries and, optionally, generated audio
    pub async fn clear_cache(&self, document_id: Option<&str>, include_audio: bool) -> Result<(u64, u64)> {
        if document_id.is_some_and(|id| id.trim().is_empty()) {
            return Err(anyhow!("Document id must not be empty"));
        }
        let entries = self.backend.clear(document_id).await?;
        let files = if include_audio {
            self.library.clear(document_id)?.files
        } else {
            0
        };
        info!("Cleared {} cache entries and {} audio files", entries, files);
        Ok((entries, files))
    }
}
