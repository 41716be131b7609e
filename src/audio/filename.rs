/*!
 * Deterministic audio filenames.
 *
 * The name of a paragraph's audio file depends only on the paragraph index
 * and the selected voice/model, never on time or randomness, so a later
 * session finds the files an earlier one generated.
 */

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Extension of every generated audio file
pub const AUDIO_EXTENSION: &str = "mp3";

/// Longest stem accepted as a proxy preferred cache key
pub const MAX_STEM_LEN: usize = 64;

const MAX_SLUG_LEN: usize = 16;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

/// Name of a paragraph's audio file inside its document directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the extension, used as the proxy's preferred cache key
    pub fn stem(&self) -> &str {
        self.0
            .strip_suffix(AUDIO_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&self.0)
    }

    /// Temporary name used while the file is being written
    pub fn partial(&self) -> String {
        format!("{}.part", self.0)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the audio filename for a paragraph
///
/// Format: `p{index:05}[_{voice}][_{model}]_{fingerprint}.mp3`. The slugs keep
/// names readable; the fingerprint covers the exact voice/model strings so
/// two selections whose slugs coincide still get different files.
pub fn build_filename(paragraph_index: usize, voice: Option<&str>, model: Option<&str>) -> FileName {
    let mut stem = format!("p{:05}", paragraph_index);

    for part in [voice, model].into_iter().flatten() {
        let slug = slugify(part);
        if !slug.is_empty() {
            stem.push('_');
            stem.push_str(&slug);
        }
    }

    stem.push('_');
    stem.push_str(&selection_fingerprint(voice, model));

    debug_assert!(stem.len() <= MAX_STEM_LEN);
    FileName(format!("{}.{}", stem, AUDIO_EXTENSION))
}

/// Preferred cache key sent to the TTS proxy for one document's paragraph
///
/// The proxy caches globally, so the key leads with a fingerprint of the
/// document id; the filename stem alone repeats across books.
pub fn preferred_cache_key(document_id: &str, file_name: &FileName) -> String {
    let digest = format!("{:x}", Sha256::digest(document_id.as_bytes()));
    format!("{}_{}", &digest[..8], file_name.stem())
}

/// Reduce the way the cache proxy does a preferred key: keep `[A-Za-z0-9_-]`,
/// trim separators, cap at 64 characters
pub fn sanitize_preferred_key(candidate: &str) -> Option<String> {
    let kept: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let trimmed = kept.trim_matches(|c| c == '-' || c == '_');
    let capped: String = trimmed.chars().take(MAX_STEM_LEN).collect();

    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let slug = NON_SLUG.replace_all(&lowered, "-");
    let capped: String = slug.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    capped.trim_end_matches('-').to_string()
}

fn selection_fingerprint(voice: Option<&str>, model: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [voice, model] {
        match part {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}
