/*!
 * Provider implementations for translation and speech services.
 *
 * This module contains client implementations for the external providers:
 * - OpenAI: chat completions for translation, speech endpoint for TTS
 * - Anthropic: messages API for translation
 * - Speech: routes TTS requests directly or through the cache proxy
 * - Mock: deterministic providers for tests
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod speech;

/// A single paragraph translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Source paragraph text
    pub text: String,
    /// ISO 639-1 target language code
    pub target_language: String,
    /// Model override; the provider's configured model when `None`
    pub model: Option<String>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_language: target_language.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A single paragraph speech synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Voice identifier
    pub voice: String,
    /// TTS model identifier
    pub model: String,
    /// Stem the cache proxy should store the result under
    pub preferred_key: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            model: model.into(),
            preferred_key: None,
        }
    }

    pub fn with_preferred_key(mut self, key: impl Into<String>) -> Self {
        self.preferred_key = Some(key.into());
        self
    }
}

/// Common trait for translation providers
///
/// Implementations are interchangeable behind the reconciler.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate one paragraph
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The translated text or an error
    async fn translate(&self, request: TranslationRequest) -> Result<String, ProviderError>;

    /// Short provider name stored as cache metadata
    fn name(&self) -> &str;

    /// Model used when a request does not override it
    fn default_model(&self) -> &str;
}

/// Common trait for speech synthesis providers
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Synthesize one paragraph into encoded audio bytes
    async fn synthesize(&self, request: SpeechRequest) -> Result<Bytes, ProviderError>;
}

/// Reject empty provider output the same way for every translator
pub(crate) fn non_empty_translation(text: String) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ProviderError::ParseError("Provider returned an empty translation".to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Fill the `{target_language}` placeholder of a system prompt
pub(crate) fn render_system_prompt(template: &str, target_language: &str) -> String {
    template.replace("{target_language}", target_language)
}
