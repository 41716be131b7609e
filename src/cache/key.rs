/*!
 * Identity key builder.
 *
 * Keys are a pure function of their inputs. Every component is escaped so
 * the key only contains `[A-Za-z0-9._~-]`: bytes outside `[A-Za-z0-9_-]`
 * become `~XX`, and components are joined with `.`. The escaping is
 * reversible and `.` never appears inside a component, so distinct inputs
 * always produce distinct keys.
 */

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::errors::KeyError;

/// Which artifact family a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Translation,
    Audio,
}

impl KeyKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Translation => "tr",
            Self::Audio => "au",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Translation => write!(f, "translation"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Deterministic identifier of one cached artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: KeyKind,
    document_id: String,
    paragraph_index: usize,
    components: Vec<String>,
    encoded: String,
}

impl CacheKey {
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn paragraph_index(&self) -> usize {
        self.paragraph_index
    }

    /// Trailing identity components: `[language]` or `[voice, model]`
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Storage identifier, also safe as a filename component
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Build the key of a paragraph translation
pub fn build_translation_key(
    document_id: &str,
    paragraph_index: i64,
    language: &str,
) -> Result<CacheKey, KeyError> {
    let index = validate_common(document_id, paragraph_index)?;
    require_non_empty("language", language)?;

    Ok(assemble(KeyKind::Translation, document_id, index, &[language]))
}

/// Build the key of a paragraph audio rendition
pub fn build_audio_key(
    document_id: &str,
    paragraph_index: i64,
    voice: &str,
    model: &str,
) -> Result<CacheKey, KeyError> {
    let index = validate_common(document_id, paragraph_index)?;
    require_non_empty("voice", voice)?;
    require_non_empty("model", model)?;

    Ok(assemble(KeyKind::Audio, document_id, index, &[voice, model]))
}

/// Convert an arbitrary numeric index, rejecting fractions and non-finite values
pub fn paragraph_index_from_f64(value: f64) -> Result<i64, KeyError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(KeyError::InvalidKeyInput(format!(
            "paragraph index must be an integer, got {}",
            value
        )));
    }
    if value < 0.0 || value > i64::MAX as f64 {
        return Err(KeyError::InvalidKeyInput(format!(
            "paragraph index out of range: {}",
            value
        )));
    }
    Ok(value as i64)
}

/// Parse a textual index such as a CLI argument or a DOM attribute
pub fn parse_paragraph_index(value: &str) -> Result<i64, KeyError> {
    let trimmed = value.trim();
    if let Ok(index) = trimmed.parse::<i64>() {
        return Ok(index);
    }
    let numeric = trimmed.parse::<f64>().map_err(|_| {
        KeyError::InvalidKeyInput(format!("paragraph index is not numeric: {:?}", value))
    })?;
    paragraph_index_from_f64(numeric)
}

/// Convert an in-memory paragraph position into a key index
pub fn index_of(position: usize) -> Result<i64, KeyError> {
    i64::try_from(position)
        .map_err(|_| KeyError::InvalidKeyInput(format!("paragraph index too large: {}", position)))
}

fn validate_common(document_id: &str, paragraph_index: i64) -> Result<usize, KeyError> {
    require_non_empty("document id", document_id)?;
    if paragraph_index < 0 {
        return Err(KeyError::InvalidKeyInput(format!(
            "paragraph index must not be negative, got {}",
            paragraph_index
        )));
    }
    usize::try_from(paragraph_index).map_err(|_| {
        KeyError::InvalidKeyInput(format!("paragraph index too large: {}", paragraph_index))
    })
}

fn require_non_empty(name: &str, value: &str) -> Result<(), KeyError> {
    if value.trim().is_empty() {
        return Err(KeyError::InvalidKeyInput(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn assemble(kind: KeyKind, document_id: &str, index: usize, rest: &[&str]) -> CacheKey {
    let mut encoded = String::from(kind.prefix());
    encoded.push('.');
    escape_into(&mut encoded, document_id);
    let _ = write!(encoded, ".{}", index);
    for component in rest {
        encoded.push('.');
        escape_into(&mut encoded, component);
    }

    CacheKey {
        kind,
        document_id: document_id.to_string(),
        paragraph_index: index,
        components: rest.iter().map(|c| c.to_string()).collect(),
        encoded,
    }
}

/// Escape one component on its own, e.g. to name a directory after it
pub fn escape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    escape_into(&mut out, component);
    out
}

fn escape_into(out: &mut String, component: &str) {
    for byte in component.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "~{:02X}", byte);
        }
    }
}
