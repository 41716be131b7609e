/*!
 * Reader session.
 *
 * Binds one loaded document to a reconciler and the session's target
 * language. Moving to another paragraph cancels the waiters of the one left
 * behind; closing the session cancels all of them.
 */

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::cache::TranslationEntry;
use crate::document::Document;
use crate::errors::{KeyError, ReconcileError};
use crate::language_utils;
use crate::reconciler::{PlayableAudio, ReconcileOutcome, Reconciler, Served};

use super::models::ReconcileSummary;

/// Default number of paragraphs probed at once by the reconcile pass
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 8;

pub struct ReaderSession {
    id: String,
    document: Arc<Document>,
    reconciler: Reconciler,
    target_language: String,
    reconcile_concurrency: usize,
    visible: Mutex<Option<usize>>,
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("id", &self.id)
            .field("target_language", &self.target_language)
            .field("reconcile_concurrency", &self.reconcile_concurrency)
            .finish_non_exhaustive()
    }
}

impl ReaderSession {
    /// Open a session; `target_language` may be any ISO 639 form
    pub fn new(document: Document, reconciler: Reconciler, target_language: &str) -> Result<Self, ReconcileError> {
        let target_language = normalize_language(target_language)?;
        let id = Uuid::new_v4().to_string();

        info!(
            "Opened reader session {} for document {} ({} paragraphs, target {})",
            &id[..8],
            document.id(),
            document.len(),
            target_language
        );

        Ok(Self {
            id,
            document: Arc::new(document),
            reconciler,
            target_language,
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
            visible: Mutex::new(None),
        })
    }

    pub fn with_reconcile_concurrency(mut self, concurrency: usize) -> Self {
        self.reconcile_concurrency = concurrency.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Paragraph currently shown, if any
    pub fn visible_paragraph(&self) -> Option<usize> {
        *self.visible.lock()
    }

    /// Show paragraph `index`, cancelling waiters of every other paragraph
    pub fn navigate_to(&self, index: usize) -> Result<(), ReconcileError> {
        if self.document.paragraph(index).is_none() {
            return Err(ReconcileError::UnknownParagraph(index));
        }

        let doc_id = self.document.id().as_str();
        let previous = self.visible.lock().replace(index);
        let visibility = self.reconciler.visibility();
        let left = visibility.leave_others(doc_id, index);
        if left > 0 {
            debug!(
                "Left {} paragraph(s) on the way from {:?} to {}; pending requests keep running",
                left, previous, index
            );
        }
        visibility.enter(doc_id, index);
        Ok(())
    }

    /// Translate a paragraph into the session's target language
    pub async fn translate(&self, index: usize) -> Result<Served<TranslationEntry>, ReconcileError> {
        self.reconciler.translate(&self.document, index, &self.target_language).await
    }

    /// Translate a paragraph into another language
    pub async fn translate_into(&self, index: usize, language: &str) -> Result<Served<TranslationEntry>, ReconcileError> {
        let language = normalize_language(language)?;
        self.reconciler.translate(&self.document, index, &language).await
    }

    pub async fn retranslate(&self, index: usize) -> Result<Served<TranslationEntry>, ReconcileError> {
        self.reconciler.retranslate(&self.document, index, &self.target_language).await
    }

    pub async fn speak(&self, index: usize) -> Result<Served<PlayableAudio>, ReconcileError> {
        self.reconciler.speak(&self.document, index).await
    }

    pub async fn regenerate_audio(&self, index: usize) -> Result<Served<PlayableAudio>, ReconcileError> {
        self.reconciler.regenerate_audio(&self.document, index).await
    }

    /// Attach present local audio for every paragraph
    pub async fn reconcile_rendered(&self) -> ReconcileSummary {
        self.reconcile_rendered_with(|_, _| {}).await
    }

    /// Like [`reconcile_rendered`](Self::reconcile_rendered), reporting each paragraph as it completes
    pub async fn reconcile_rendered_with<F>(&self, mut on_paragraph: F) -> ReconcileSummary
    where
        F: FnMut(usize, &Result<ReconcileOutcome, ReconcileError>),
    {
        let document = &self.document;
        let reconciler = &self.reconciler;

        let mut results = stream::iter(0..document.len())
            .map(|index| async move { (index, reconciler.reconcile_audio(document, index).await) })
            .buffer_unordered(self.reconcile_concurrency);

        let mut summary = ReconcileSummary::default();
        while let Some((index, result)) = results.next().await {
            if let Err(e) = &result {
                debug!("Reconcile of paragraph {} failed: {}", index, e);
            }
            summary.record(&result);
            on_paragraph(index, &result);
        }

        info!("Reconcile pass for {}: {}", document.id(), summary);
        summary
    }

    /// Cancel every waiter of this session
    pub fn close(&self) {
        self.reconciler.visibility().cancel_all();
        *self.visible.lock() = None;
        info!("Closed reader session {}", &self.id[..8]);
    }
}

fn normalize_language(code: &str) -> Result<String, ReconcileError> {
    language_utils::normalize_to_part1_or_part2t(code)
        .map_err(|e| ReconcileError::InvalidKey(KeyError::InvalidKeyInput(e.to_string())))
}
