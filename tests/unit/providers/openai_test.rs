/*!
 * Tests for the OpenAI translation client
 */

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use readalong::errors::ProviderError;
use readalong::providers::openai::OpenAI;
use readalong::providers::{TranslationRequest, Translator};

fn client(server: &MockServer) -> OpenAI {
    OpenAI::new("sk-test", format!("{}/v1", server.uri()), "gpt-4o-mini")
        .with_system_prompt("Translate into {target_language}.")
}

fn completion(text: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
}

/// Test a successful translation request
#[tokio::test]
async fn test_translate_withSuccessResponse_shouldReturnText() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "Translate into fr." },
                { "role": "user", "content": "Hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(" Bonjour \n")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).translate(TranslationRequest::new("Hello", "fr")).await.unwrap();
    assert_eq!(text, "Bonjour");
}

/// Test that a per-request model overrides the default
#[tokio::test]
async fn test_translate_withModelOverride_shouldSendOverride() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hallo")))
        .expect(1)
        .mount(&server)
        .await;

    let request = TranslationRequest::new("Hello", "de").with_model("gpt-4o");
    assert_eq!(client(&server).translate(request).await.unwrap(), "Hallo");
}

/// Test HTTP status mapping
#[tokio::test]
async fn test_translate_withErrorStatus_shouldMapProviderError() {
    let cases = [(401, "auth"), (429, "rate"), (500, "api")];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let error = client(&server).translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();
        match (kind, error) {
            ("auth", ProviderError::AuthenticationError(_)) => {}
            ("rate", ProviderError::RateLimitExceeded(_)) => {}
            ("api", ProviderError::ApiError { status_code, message }) => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "nope");
            }
            (kind, other) => panic!("status {} ({}) mapped to {:?}", status, kind, other),
        }
    }
}

/// Test that empty or malformed bodies are parse errors
#[tokio::test]
async fn test_translate_withUnusableBody_shouldBeParseError() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let translator = client(&server);
    for _ in 0..2 {
        let error = translator.translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();
        assert!(matches!(error, ProviderError::ParseError(_)), "got {:?}", error);
    }
}

/// Test that an unreachable server is a connection error
#[tokio::test]
async fn test_translate_withUnreachableServer_shouldBeRetryable() {
    let translator = OpenAI::new("sk-test", "http://127.0.0.1:9/v1", "gpt-4o-mini");
    let error = translator.translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();
    assert!(matches!(error, ProviderError::ConnectionError(_) | ProviderError::RequestFailed(_)));
    assert_eq!(translator.name(), "openai");
    assert_eq!(translator.default_model(), "gpt-4o-mini");
}
