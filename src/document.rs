/*!
 * Loaded document model.
 *
 * A document is an identifier derived from the loaded file plus an ordered,
 * immutable list of paragraphs. Parsing real book formats happens outside
 * this crate; `Document::from_plain_text` only splits on blank lines.
 */

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identifier of a loaded document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an identifier supplied by the caller
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from the raw bytes of the loaded file
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One paragraph of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 0-based position, stable for the document's lifetime
    pub index: usize,
    /// Original text
    pub text: String,
}

/// A loaded document
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    title: Option<String>,
    paragraphs: Vec<Paragraph>,
}

impl Document {
    /// Build a document from already parsed paragraph texts
    pub fn new(id: DocumentId, texts: Vec<String>) -> Self {
        let paragraphs = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Paragraph { index, text })
            .collect();

        Self {
            id,
            title: None,
            paragraphs,
        }
    }

    /// Split plain text into paragraphs separated by blank lines
    pub fn from_plain_text(id: DocumentId, content: &str) -> Self {
        let mut texts = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    texts.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(line.trim());
            }
        }
        if !current.is_empty() {
            texts.push(current.join(" "));
        }

        Self::new(id, texts)
    }

    /// Load a plain text file; the id is the SHA-256 of its bytes
    pub fn load_plain_text<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read document: {:?}", path))?;
        let content = String::from_utf8_lossy(&bytes);

        let mut document = Self::from_plain_text(DocumentId::from_bytes(&bytes), &content);
        document.title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string());
        Ok(document)
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Look up a paragraph by index
    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        self.paragraphs.get(index)
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}
