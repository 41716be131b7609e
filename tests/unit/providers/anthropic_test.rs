/*!
 * Tests for the Anthropic translation client
 */

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use readalong::errors::ProviderError;
use readalong::providers::anthropic::Anthropic;
use readalong::providers::{TranslationRequest, Translator};

/// Test a successful messages request
#[tokio::test]
async fn test_translate_withSuccessResponse_shouldJoinTextBlocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku-20240307",
            "system": "Translate into de.",
            "messages": [{ "role": "user", "content": "Good night" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Gute " },
                { "type": "text", "text": "Nacht" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let translator = Anthropic::new("sk-ant", server.uri(), "claude-3-haiku-20240307")
        .with_system_prompt("Translate into {target_language}.");
    let text = translator.translate(TranslationRequest::new("Good night", "de")).await.unwrap();

    assert_eq!(text, "Gute Nacht");
    assert_eq!(translator.name(), "anthropic");
}

/// Test error mapping for rejected keys
#[tokio::test]
async fn test_translate_withForbidden_shouldBeAuthenticationError() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let translator = Anthropic::new("bad", server.uri(), "claude-3-haiku-20240307");
    let error = translator.translate(TranslationRequest::new("Hi", "fr")).await.unwrap_err();
    assert!(matches!(error, ProviderError::AuthenticationError(_)));
}

/// Test that a reply without text blocks is a parse error
#[tokio::test]
async fn test_translate_withoutTextBlocks_shouldBeParseError() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [{ "type": "tool_use" }] })))
        .mount(&server)
        .await;

    let translator = Anthropic::new("sk-ant", server.uri(), "claude-3-haiku-20240307");
    let error = translator.translate(TranslationRequest::new("Hi", "fr")).await.unwrap_err();
    assert!(matches!(error, ProviderError::ParseError(_)));
}
