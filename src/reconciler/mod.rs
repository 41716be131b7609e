/*!
 * Artifact reconciler.
 *
 * Decides, per paragraph and per artifact kind, whether to serve from the
 * cache store, attach a local audio file, join an in-flight request, or call
 * the external provider. Every request runs on a spawned task: a caller that
 * leaves the paragraph stops waiting, but the fetch still completes and
 * populates the cache.
 */

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::audio::{
    build_filename, preferred_cache_key, AudioHandle, AudioLibrary, AudioProbe, FileName, ProbeOutcome,
};
use crate::cache::key::index_of;
use crate::cache::{
    build_audio_key, build_translation_key, Artifact, ArtifactStore, AudioEntry, CacheKey, PutOutcome,
    TranslationEntry,
};
use crate::document::{Document, Paragraph};
use crate::errors::{ReconcileError, StoreError};
use crate::providers::{SpeechRequest, SpeechSynthesizer, TranslationRequest, Translator};

pub mod inflight;
pub mod state;
pub mod visibility;

use self::inflight::{Attachment, Fetched, InflightMap, SharedFetch};
pub use self::state::{ArtifactState, StateBoard};
pub use self::visibility::Visibility;

/// Where a served artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// The cache store already had it
    Cache,
    /// This call went to the external provider
    Provider,
    /// A local audio file was found and attached
    LocalFile,
    /// Another caller's request for the same key produced it
    InFlight,
}

/// An artifact together with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub source: ServedFrom,
}

/// Audio entry plus a handle the player can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableAudio {
    pub entry: AudioEntry,
    pub handle: AudioHandle,
}

/// Result of the post-render audio reconcile step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A local file was found and attached
    Attached(AudioHandle),
    /// This key was attached by an earlier pass
    AlreadyAttached,
    /// No playable file exists yet
    Absent,
    /// A generation request for the key is in flight
    Busy,
}

/// TTS voice and model in effect for audio keys and filenames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSelection {
    pub voice: String,
    pub model: String,
}

impl SpeechSelection {
    pub fn new(voice: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            model: model.into(),
        }
    }
}

struct Inner {
    store: Arc<dyn ArtifactStore>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    probe: Arc<dyn AudioProbe>,
    library: AudioLibrary,
    speech: SpeechSelection,
    states: StateBoard,
    inflight: InflightMap,
    visibility: Visibility,
    reconciled: Mutex<HashSet<String>>,
}

/// Paragraph-level translation and audio reconciler
///
/// Cloning is cheap; clones share state, in-flight requests and visibility.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        probe: Arc<dyn AudioProbe>,
        library: AudioLibrary,
        speech: SpeechSelection,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                translator,
                synthesizer,
                probe,
                library,
                speech,
                states: StateBoard::new(),
                inflight: InflightMap::new(),
                visibility: Visibility::new(),
                reconciled: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.inner.store
    }

    pub fn library(&self) -> &AudioLibrary {
        &self.inner.library
    }

    pub fn speech_selection(&self) -> &SpeechSelection {
        &self.inner.speech
    }

    pub fn visibility(&self) -> &Visibility {
        &self.inner.visibility
    }

    /// Number of external requests currently running
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    pub fn translation_key(&self, document: &Document, index: usize, language: &str) -> Result<CacheKey, ReconcileError> {
        Ok(build_translation_key(document.id().as_str(), index_of(index)?, language)?)
    }

    pub fn audio_key(&self, document: &Document, index: usize) -> Result<CacheKey, ReconcileError> {
        let speech = &self.inner.speech;
        Ok(build_audio_key(document.id().as_str(), index_of(index)?, &speech.voice, &speech.model)?)
    }

    pub fn audio_file_name(&self, index: usize) -> FileName {
        let speech = &self.inner.speech;
        build_filename(index, Some(&speech.voice), Some(&speech.model))
    }

    /// Current state of a key
    pub fn state(&self, key: &CacheKey) -> ArtifactState {
        self.inner.states.get(key.as_str())
    }

    /// Watch a key's state; only this key's changes wake the receiver
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<ArtifactState> {
        self.inner.states.subscribe(key.as_str())
    }

    /// Serve a paragraph's translation, calling the provider on a miss
    pub async fn translate(
        &self,
        document: &Document,
        index: usize,
        language: &str,
    ) -> Result<Served<TranslationEntry>, ReconcileError> {
        self.translate_with(document, index, language, false).await
    }

    /// Ask the provider again and overwrite the cached translation
    pub async fn retranslate(
        &self,
        document: &Document,
        index: usize,
        language: &str,
    ) -> Result<Served<TranslationEntry>, ReconcileError> {
        self.translate_with(document, index, language, true).await
    }

    /// Serve a paragraph's audio: cache, then local file, then TTS
    pub async fn speak(&self, document: &Document, index: usize) -> Result<Served<PlayableAudio>, ReconcileError> {
        self.speak_with(document, index, false).await
    }

    /// Synthesize again, overwriting the file under the same name
    pub async fn regenerate_audio(&self, document: &Document, index: usize) -> Result<Served<PlayableAudio>, ReconcileError> {
        self.speak_with(document, index, true).await
    }

    /// Attach an already present local audio file, at most once per key
    ///
    /// Never starts a network request and leaves in-flight generations alone.
    pub async fn reconcile_audio(&self, document: &Document, index: usize) -> Result<ReconcileOutcome, ReconcileError> {
        paragraph_of(document, index)?;
        let inner = &self.inner;
        let key = self.audio_key(document, index)?;

        if inner.reconciled.lock().contains(key.as_str()) {
            return Ok(ReconcileOutcome::AlreadyAttached);
        }
        if inner.inflight.contains(key.as_str()) {
            debug!("Skipping reconcile of {}: generation in flight", key);
            return Ok(ReconcileOutcome::Busy);
        }

        let file_name = self.audio_file_name(index);
        let handle = match inner.probe.probe(document.id().as_str(), &file_name).await {
            ProbeOutcome::Present(handle) => handle,
            ProbeOutcome::Absent => return Ok(ReconcileOutcome::Absent),
        };

        // A generation may have started while the probe ran
        if inner.inflight.contains(key.as_str()) {
            return Ok(ReconcileOutcome::Busy);
        }
        if !inner.reconciled.lock().insert(key.as_str().to_string()) {
            return Ok(ReconcileOutcome::AlreadyAttached);
        }

        if let Err(e) = inner.record_local_file(&key, &file_name, &handle).await {
            inner.reconciled.lock().remove(key.as_str());
            return Err(e);
        }

        inner.states.mark_cached(key.as_str(), true);
        info!("Attached local audio {} to paragraph {}", file_name, index);
        Ok(ReconcileOutcome::Attached(handle))
    }

    async fn translate_with(
        &self,
        document: &Document,
        index: usize,
        language: &str,
        force: bool,
    ) -> Result<Served<TranslationEntry>, ReconcileError> {
        let paragraph = paragraph_of(document, index)?;
        let key = self.translation_key(document, index, language)?;
        let inner = &self.inner;

        if !force {
            if let Some(entry) = inner.cached_translation(&key).await? {
                debug!("Translation cache hit for {}", key);
                if !inner.inflight.contains(key.as_str()) {
                    inner.states.mark_cached(key.as_str(), true);
                }
                return Ok(Served {
                    value: entry,
                    source: ServedFrom::Cache,
                });
            }
            debug!("Translation cache miss for {}", key);
        }

        let request = TranslationRequest::new(paragraph.text.clone(), language);
        let fetch = {
            let inner = Arc::clone(&self.inner);
            let key = key.clone();
            async move { inner.fetch_translation(&key, request, force).await }
        };

        let (artifact, source) = self.coalesce(&key, fetch).await?;
        let value = match artifact {
            Artifact::Translation(entry) => entry,
            other => return Err(kind_mismatch(&key, &other)),
        };
        Ok(Served { value, source })
    }

    async fn speak_with(
        &self,
        document: &Document,
        index: usize,
        force: bool,
    ) -> Result<Served<PlayableAudio>, ReconcileError> {
        let paragraph = paragraph_of(document, index)?;
        let key = self.audio_key(document, index)?;
        let file_name = self.audio_file_name(index);
        let document_id = document.id().as_str().to_string();
        let inner = &self.inner;

        if !force {
            if let Some((audio, source)) = inner.local_audio(&key, &document_id, &file_name).await? {
                debug!("Audio for {} served from {:?}", key, source);
                if !inner.inflight.contains(key.as_str()) {
                    inner.states.mark_cached(key.as_str(), true);
                }
                return Ok(Served { value: audio, source });
            }
            debug!("Audio cache miss for {}", key);
        }

        let request = SpeechRequest::new(paragraph.text.clone(), &inner.speech.voice, &inner.speech.model)
            .with_preferred_key(preferred_cache_key(&document_id, &file_name));
        let fetch = {
            let inner = Arc::clone(&self.inner);
            let key = key.clone();
            let document_id = document_id.clone();
            let file_name = file_name.clone();
            async move { inner.fetch_audio(&key, &document_id, &file_name, request, force).await }
        };

        let (artifact, source) = self.coalesce(&key, fetch).await?;
        let entry = match artifact {
            Artifact::Audio(entry) => entry,
            other => return Err(kind_mismatch(&key, &other)),
        };
        let handle = AudioHandle::new(inner.library.path_for(&document_id, &file_name), entry.byte_len);
        Ok(Served {
            value: PlayableAudio { entry, handle },
            source,
        })
    }

    /// Run `fetch` as the single request for `key`, or wait on the one already running
    async fn coalesce<F>(&self, key: &CacheKey, fetch: F) -> Result<(Artifact, ServedFrom), ReconcileError>
    where
        F: Future<Output = Result<Fetched, ReconcileError>> + Send + 'static,
    {
        let inner = &self.inner;
        let index = key.paragraph_index();
        let token = inner.visibility.enter(key.document_id(), index);

        let (shared, attachment) = inner
            .inflight
            .join_or_start(key.as_str(), |id| start_fetch(&self.inner, key.clone(), id, fetch));
        if attachment == Attachment::Follower {
            debug!("Joining in-flight request for {}", key);
        }

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Paragraph {} left while waiting for {}; the request continues in the background", index, key);
                return Err(ReconcileError::Cancelled(index));
            }
            result = shared => result?,
        };

        let source = match attachment {
            Attachment::Leader => fetched.source,
            Attachment::Follower => ServedFrom::InFlight,
        };
        Ok((fetched.artifact, source))
    }
}

/// Register the request as `Requesting` and spawn it
///
/// Runs under the in-flight map lock, so it must not block.
fn start_fetch<F>(inner: &Arc<Inner>, key: CacheKey, id: u64, fetch: F) -> SharedFetch
where
    F: Future<Output = Result<Fetched, ReconcileError>> + Send + 'static,
{
    inner.states.begin_request(key.as_str());

    let task_inner = Arc::clone(inner);
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
        let result = fetch.await;
        task_inner.finish(&task_key, &result);
        task_inner.inflight.remove(task_key.as_str(), id);
        result
    });

    let inner = Arc::clone(inner);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                let error = ReconcileError::Internal(e.to_string());
                let result = Err(error.clone());
                inner.finish(&key, &result);
                inner.inflight.remove(key.as_str(), id);
                Err(error)
            }
        }
    }
    .boxed()
    .shared()
}

impl Inner {
    /// Publish the final state of a request
    ///
    /// Subscribers are woken only while the paragraph is still visible;
    /// otherwise the state changes silently.
    fn finish(&self, key: &CacheKey, result: &Result<Fetched, ReconcileError>) {
        let notify = self.visibility.is_visible(key.document_id(), key.paragraph_index());
        match result {
            Ok(_) => self.states.mark_cached(key.as_str(), notify),
            Err(e) => {
                error!("Request for {} failed: {}", key, e);
                self.states
                    .transition(key.as_str(), ArtifactState::Failed(e.to_string()), notify);
            }
        }
        if !notify {
            debug!("{} finished after its paragraph was left", key);
        }
    }

    async fn fetch_translation(
        &self,
        key: &CacheKey,
        request: TranslationRequest,
        force: bool,
    ) -> Result<Fetched, ReconcileError> {
        if !force {
            if let Some(entry) = self.cached_translation(key).await? {
                debug!("{} was cached while this request was being set up", key);
                return Ok(Fetched {
                    artifact: Artifact::Translation(entry),
                    source: ServedFrom::Cache,
                });
            }
        }

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.translator.default_model().to_string());
        info!(
            "Translating paragraph {} of {} into {} with {} ({})",
            key.paragraph_index(),
            key.document_id(),
            request.target_language,
            self.translator.name(),
            model
        );

        let text = self.translator.translate(request).await?;
        let artifact = Artifact::Translation(TranslationEntry::new(text, self.translator.name(), model));
        self.store_artifact(key, &artifact, force).await?;

        Ok(Fetched {
            artifact,
            source: ServedFrom::Provider,
        })
    }

    async fn fetch_audio(
        &self,
        key: &CacheKey,
        document_id: &str,
        file_name: &FileName,
        request: SpeechRequest,
        force: bool,
    ) -> Result<Fetched, ReconcileError> {
        if !force {
            if let Some((audio, source)) = self.local_audio(key, document_id, file_name).await? {
                debug!("{} became available while this request was being set up", key);
                return Ok(Fetched {
                    artifact: Artifact::Audio(audio.entry),
                    source,
                });
            }
        }

        info!(
            "Synthesizing paragraph {} of {} (voice {}, model {})",
            key.paragraph_index(),
            document_id,
            request.voice,
            request.model
        );

        let audio = self.synthesizer.synthesize(request).await?;
        let byte_len = self.library.write(document_id, file_name, &audio).await?;
        let artifact = Artifact::Audio(AudioEntry::new(
            file_name.as_str(),
            byte_len,
            &self.speech.voice,
            &self.speech.model,
        ));
        self.store_artifact(key, &artifact, force).await?;

        Ok(Fetched {
            artifact,
            source: ServedFrom::Provider,
        })
    }

    /// Cached entry plus a playable file, or `None` when the file is missing
    async fn local_audio(
        &self,
        key: &CacheKey,
        document_id: &str,
        file_name: &FileName,
    ) -> Result<Option<(PlayableAudio, ServedFrom)>, ReconcileError> {
        let stored = self.cached_audio(key).await?;

        match self.probe.probe(document_id, file_name).await {
            ProbeOutcome::Present(handle) => match stored {
                Some(entry) if entry.file_name == file_name.as_str() && entry.byte_len == handle.byte_len() => {
                    Ok(Some((PlayableAudio { entry, handle }, ServedFrom::Cache)))
                }
                _ => {
                    let entry = self.record_local_file(key, file_name, &handle).await?;
                    Ok(Some((PlayableAudio { entry, handle }, ServedFrom::LocalFile)))
                }
            },
            ProbeOutcome::Absent => {
                if stored.is_some() {
                    warn!("Cache entry {} points at missing audio {}; it will be regenerated", key, file_name);
                }
                Ok(None)
            }
        }
    }

    /// Write the cache entry describing a detected local file
    async fn record_local_file(
        &self,
        key: &CacheKey,
        file_name: &FileName,
        handle: &AudioHandle,
    ) -> Result<AudioEntry, ReconcileError> {
        let entry = AudioEntry::new(
            file_name.as_str(),
            handle.byte_len(),
            &self.speech.voice,
            &self.speech.model,
        );
        // Replacing a stale entry for the same file is expected here
        self.store_artifact(key, &Artifact::Audio(entry.clone()), true).await?;
        Ok(entry)
    }

    /// Forced writes replace the entry even when its content is unchanged
    async fn store_artifact(&self, key: &CacheKey, artifact: &Artifact, force: bool) -> Result<(), ReconcileError> {
        let outcome = if force {
            self.store.replace(key, artifact).await?
        } else {
            self.store.put(key, artifact).await?
        };
        match outcome {
            PutOutcome::Overwritten if !force => {
                warn!("StoreWriteConflict: {} was overwritten; last writer wins", key);
            }
            outcome => debug!("Stored {} ({:?})", key, outcome),
        }
        Ok(())
    }

    async fn cached_translation(&self, key: &CacheKey) -> Result<Option<TranslationEntry>, ReconcileError> {
        match self.store.get(key).await? {
            Some(Artifact::Translation(entry)) => Ok(Some(entry)),
            Some(other) => Err(kind_mismatch(key, &other)),
            None => Ok(None),
        }
    }

    async fn cached_audio(&self, key: &CacheKey) -> Result<Option<AudioEntry>, ReconcileError> {
        match self.store.get(key).await? {
            Some(Artifact::Audio(entry)) => Ok(Some(entry)),
            Some(other) => Err(kind_mismatch(key, &other)),
            None => Ok(None),
        }
    }
}

fn paragraph_of(document: &Document, index: usize) -> Result<&Paragraph, ReconcileError> {
    document
        .paragraph(index)
        .ok_or(ReconcileError::UnknownParagraph(index))
}

fn kind_mismatch(key: &CacheKey, artifact: &Artifact) -> ReconcileError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("expected a {} entry, found {}", key.kind(), artifact.kind()),
    }
    .into()
}
