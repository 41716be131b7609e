/*!
 * Mock provider implementations for testing.
 *
 * - `MockTranslator::working()` - Always succeeds with a tagged translation
 * - `MockTranslator::failing()` - Always fails with an API error
 * - `MockSynthesizer::working()` - Returns a small MP3-looking payload
 *
 * Every mock counts its calls; clones share the counter.
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{SpeechRequest, SpeechSynthesizer, TranslationRequest, Translator};

/// Behavior mode for the mock providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Fails the first N requests, then succeeds
    FailFirst { failures: usize },
    /// Always fails with an error
    Failing,
    /// Returns an empty response
    Empty,
}

impl MockBehavior {
    fn should_fail(&self, count: usize) -> bool {
        match *self {
            Self::Working | Self::Empty => false,
            Self::Intermittent { fail_every } => fail_every > 0 && count % fail_every == fail_every - 1,
            Self::FailFirst { failures } => count < failures,
            Self::Failing => true,
        }
    }
}

fn mock_failure(count: usize) -> ProviderError {
    ProviderError::ApiError {
        status_code: 500,
        message: format!("Simulated provider failure (request {})", count + 1),
    }
}

/// Mock translation provider
#[derive(Debug, Clone)]
pub struct MockTranslator {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
    /// Fixed translation returned for every request
    fixed_response: Option<String>,
    delay: Option<Duration>,
}

impl MockTranslator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            fixed_response: None,
            delay: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn fail_first(failures: usize) -> Self {
        Self::new(MockBehavior::FailFirst { failures })
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Always answer with `text`
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.fixed_response = Some(text.into());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, request: TranslationRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.behavior.should_fail(count) {
            return Err(mock_failure(count));
        }
        if self.behavior == MockBehavior::Empty {
            return Err(ProviderError::ParseError("Provider returned an empty translation".to_string()));
        }

        Ok(match &self.fixed_response {
            Some(text) => text.clone(),
            None => format!("[TRANSLATED to {}] {}", request.target_language, request.text),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

/// Mock speech provider
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn fail_first(failures: usize) -> Self {
        Self::new(MockBehavior::FailFirst { failures })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Payload the working mock returns: an ID3 header followed by the request fields
    pub fn fake_audio(request: &SpeechRequest) -> Bytes {
        let mut audio = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        audio.extend_from_slice(format!("{}|{}|{}", request.voice, request.model, request.text).as_bytes());
        Bytes::from(audio)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: SpeechRequest) -> Result<Bytes, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.behavior.should_fail(count) {
            return Err(mock_failure(count));
        }
        if self.behavior == MockBehavior::Empty {
            return Err(ProviderError::ParseError("TTS provider returned no audio".to_string()));
        }

        Ok(Self::fake_audio(&request))
    }
}
