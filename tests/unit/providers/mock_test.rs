/*!
 * Tests for the mock providers used throughout the suite
 */

use std::time::Duration;

use readalong::errors::ProviderError;
use readalong::providers::mock::{MockBehavior, MockSynthesizer, MockTranslator};
use readalong::providers::{SpeechRequest, SpeechSynthesizer, TranslationRequest, Translator};

/// Test that clones share one call counter
#[tokio::test]
async fn test_mockTranslator_clones_shouldShareCounter() {
    let translator = MockTranslator::working().with_response("Bonjour");
    let clone = translator.clone();

    assert_eq!(clone.translate(TranslationRequest::new("Hello", "fr")).await.unwrap(), "Bonjour");
    assert_eq!(translator.call_count(), 1);
}

/// Test scripted failure patterns
#[tokio::test]
async fn test_mockTranslator_behaviors_shouldFailAsScripted() {
    let intermittent = MockTranslator::intermittent(2);
    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(intermittent.translate(TranslationRequest::new("x", "fr")).await.is_ok());
    }
    assert_eq!(outcomes, vec![true, false, true, false]);

    let fail_first = MockTranslator::fail_first(1);
    assert!(fail_first.translate(TranslationRequest::new("x", "fr")).await.is_err());
    assert!(fail_first.translate(TranslationRequest::new("x", "fr")).await.is_ok());

    let empty = MockTranslator::new(MockBehavior::Empty);
    assert!(matches!(
        empty.translate(TranslationRequest::new("x", "fr")).await,
        Err(ProviderError::ParseError(_))
    ));
}

/// Test the synthesizer payload and delay
#[tokio::test]
async fn test_mockSynthesizer_shouldReturnMp3LikePayload() {
    let synthesizer = MockSynthesizer::working().with_delay(Duration::from_millis(10));
    let request = SpeechRequest::new("Hello.", "alloy", "tts-1");

    let audio = synthesizer.synthesize(request.clone()).await.unwrap();
    assert!(audio.starts_with(b"ID3"));
    assert_eq!(audio, MockSynthesizer::fake_audio(&request));
    assert_eq!(synthesizer.call_count(), 1);

    assert!(MockSynthesizer::failing().synthesize(request).await.is_err());
}
