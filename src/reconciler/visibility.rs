/*!
 * Visibility-scoped cancellation.
 *
 * Each visible paragraph holds a child token of one root token. Leaving the
 * paragraph cancels its token, so callers still waiting on that paragraph's
 * requests return early; the requests themselves keep running.
 */

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

type ParagraphSlot = (String, usize);

#[derive(Debug)]
pub struct Visibility {
    root: RwLock<CancellationToken>,
    tokens: Mutex<HashMap<ParagraphSlot, CancellationToken>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new()
    }
}

impl Visibility {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(CancellationToken::new()),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Token of a paragraph, making it visible if it was not
    pub fn enter(&self, document_id: &str, paragraph_index: usize) -> CancellationToken {
        let mut tokens = self.tokens.lock();
        let slot = (document_id.to_string(), paragraph_index);
        if let Some(token) = tokens.get(&slot) {
            if !token.is_cancelled() {
                return token.clone();
            }
        }

        let token = self.root.read().child_token();
        tokens.insert(slot, token.clone());
        token
    }

    /// Cancel the paragraph's token; returns whether it was visible
    pub fn leave(&self, document_id: &str, paragraph_index: usize) -> bool {
        let removed = self
            .tokens
            .lock()
            .remove(&(document_id.to_string(), paragraph_index));
        match removed {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every paragraph of a document except `keep`; returns how many were left
    ///
    /// Requests also enter their paragraph, so slots can exist for paragraphs
    /// that were never navigated to.
    pub fn leave_others(&self, document_id: &str, keep: usize) -> usize {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|(doc, index), token| {
            if doc == document_id && *index != keep {
                token.cancel();
                false
            } else {
                true
            }
        });
        before - tokens.len()
    }

    /// Number of paragraphs currently holding a token
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    pub fn is_visible(&self, document_id: &str, paragraph_index: usize) -> bool {
        self.tokens
            .lock()
            .get(&(document_id.to_string(), paragraph_index))
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Cancel every paragraph and start over with a fresh root
    pub fn cancel_all(&self) {
        {
            let mut root = self.root.write();
            root.cancel();
            *root = CancellationToken::new();
        }
        self.tokens.lock().clear();
    }
}
