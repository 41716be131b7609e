/*!
 * Tests for the speech adapter's direct and proxy routes
 */

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use readalong::audio::{build_filename, preferred_cache_key, AudioLibrary, FsAudioProbe};
use readalong::cache::MemoryStore;
use readalong::errors::ProviderError;
use readalong::providers::speech::{ProxyCacheStatus, SpeechRoute, TtsAdapter, PREFERRED_CACHE_KEY_HEADER};
use readalong::providers::mock::MockTranslator;
use readalong::providers::{SpeechRequest, SpeechSynthesizer};
use readalong::reconciler::{Reconciler, SpeechSelection};
use crate::common;

const MP3: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00frames";

fn request() -> SpeechRequest {
    let name = build_filename(0, Some("alloy"), Some("tts-1"));
    SpeechRequest::new("Hello.", "alloy", "tts-1").with_preferred_key(preferred_cache_key("bookA", &name))
}

fn audio_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(MP3.to_vec(), "audio/mpeg")
}

/// Test the direct route body and that no proxy header is sent
#[tokio::test]
async fn test_speak_direct_shouldPostSpeechBodyWithoutPreferredKey() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(json!({
            "model": "tts-1",
            "input": "Hello.",
            "voice": "alloy",
            "response_format": "mp3"
        })))
        .respond_with(audio_response())
        .expect(1)
        .mount(&server)
        .await;

    let adapter = TtsAdapter::new("sk-test", Url::parse(&server.uri()).unwrap());
    let response = adapter.speak(&request()).await.unwrap();

    assert_eq!(response.route, SpeechRoute::Direct);
    assert_eq!(response.audio.as_ref(), MP3);
    assert_eq!(response.cache_status, None);

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get(PREFERRED_CACHE_KEY_HEADER).is_none());
}

/// Test the proxy route preferred key and cache status
#[tokio::test]
async fn test_speak_proxy_shouldSendPreferredKeyAndReadCacheStatus() {
    let direct = MockServer::start().await;
    let proxy = MockServer::start().await;
    let stem = preferred_cache_key("bookA", &build_filename(0, Some("alloy"), Some("tts-1")));

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header(PREFERRED_CACHE_KEY_HEADER, stem.as_str()))
        .respond_with(audio_response().insert_header("X-Cache", "HIT"))
        .expect(1)
        .mount(&proxy)
        .await;
    Mock::given(method("POST")).respond_with(audio_response()).expect(0).mount(&direct).await;

    let adapter = TtsAdapter::new("sk-test", Url::parse(&direct.uri()).unwrap())
        .with_proxy(Url::parse(&proxy.uri()).unwrap());
    let response = adapter.speak(&request()).await.unwrap();

    assert_eq!(response.route, SpeechRoute::Proxy);
    assert_eq!(response.cache_status, Some(ProxyCacheStatus::Hit));
    assert_eq!(response.audio.as_ref(), MP3);
}

/// Test endpoint joining for bases with and without a path
#[test]
fn test_endpoint_withBasePath_shouldAppendSpeechPath() {
    let adapter = TtsAdapter::new("", Url::parse("http://localhost:8000/tts").unwrap());
    assert_eq!(adapter.endpoint().unwrap().as_str(), "http://localhost:8000/tts/v1/audio/speech");

    let adapter = adapter.with_proxy(Url::parse("http://127.0.0.1:22999/").unwrap());
    assert_eq!(adapter.endpoint().unwrap().as_str(), "http://127.0.0.1:22999/v1/audio/speech");
}

/// Test that both routes share the error mapping
#[tokio::test]
async fn test_speak_withErrorStatus_shouldMapSameOnBothRoutes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    let base = Url::parse(&server.uri()).unwrap();

    let direct = TtsAdapter::new("sk-test", base.clone());
    let proxied = TtsAdapter::new("sk-test", base.clone()).with_proxy(base);

    for adapter in [direct, proxied] {
        let error = adapter.speak(&request()).await.unwrap_err();
        assert!(matches!(error, ProviderError::RateLimitExceeded(_)), "{} route: {:?}", adapter.route(), error);
    }
}

/// Test rejection of non-audio and empty bodies
#[tokio::test]
async fn test_speak_withUnusableBody_shouldBeParseError() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"<html></html>".to_vec(), "text/html"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(Vec::new(), "audio/mpeg"))
        .mount(&server)
        .await;

    let adapter = TtsAdapter::new("sk-test", Url::parse(&server.uri()).unwrap());
    for _ in 0..2 {
        let error = adapter.synthesize(request()).await.unwrap_err();
        assert!(matches!(error, ProviderError::ParseError(_)), "got {:?}", error);
    }
}

/// Test that a slow server surfaces as a timeout
#[tokio::test]
async fn test_speak_withSlowServer_shouldTimeOut() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(audio_response().set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let adapter = TtsAdapter::new("sk-test", Url::parse(&server.uri()).unwrap()).with_timeout(Duration::from_millis(50));
    let error = adapter.speak(&request()).await.unwrap_err();
    assert!(matches!(error, ProviderError::Timeout(_)), "got {:?}", error);
}

/// Test that the same paragraph of two books never shares a proxy cache entry
#[tokio::test]
async fn test_speak_proxyForTwoDocuments_shouldSendDistinctPreferredKeys() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(audio_response().insert_header("X-Cache", "MISS"))
        .expect(2)
        .mount(&proxy)
        .await;

    let dir = common::create_temp_dir().unwrap();
    let library = AudioLibrary::new(dir.path());
    let base = Url::parse(&proxy.uri()).unwrap();
    let adapter = TtsAdapter::new("sk-test", base.clone()).with_proxy(base);
    let reconciler = Reconciler::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockTranslator::working()),
        Arc::new(adapter),
        Arc::new(FsAudioProbe::new(library.clone())),
        library,
        SpeechSelection::new("alloy", "tts-1"),
    );

    reconciler.speak(&common::sample_document("bookA", 1), 0).await.unwrap();
    reconciler.speak(&common::sample_document("bookB", 1), 0).await.unwrap();

    let received = proxy.received_requests().await.unwrap();
    let keys: Vec<String> = received
        .iter()
        .map(|r| r.headers.get(PREFERRED_CACHE_KEY_HEADER).unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);

    let name = reconciler.audio_file_name(0);
    assert_eq!(keys[0], preferred_cache_key("bookA", &name));
    assert_eq!(keys[1], preferred_cache_key("bookB", &name));
}
