use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{non_empty_translation, render_system_prompt, TranslationRequest, Translator};

/// Public OpenAI API base, shared by chat completions and speech
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Voices accepted by the OpenAI speech endpoint
pub const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// OpenAI (or OpenAI-compatible) chat completions client used for translation
#[derive(Debug)]
pub struct OpenAI {
    client: Client,
    api_key: String,
    /// API base URL, e.g. `https://api.openai.com/v1`; empty means the public API
    endpoint: String,
    model: String,
    system_prompt: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: Some(0.3),
        }
    }

    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }
}

impl OpenAI {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            system_prompt: String::new(),
        }
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder().timeout(timeout).build().unwrap_or_default();
        self
    }

    fn api_url(&self) -> String {
        let base = if self.endpoint.is_empty() {
            DEFAULT_API_BASE
        } else {
            self.endpoint.trim_end_matches('/')
        };
        format!("{}/chat/completions", base)
    }

    /// Send a chat completion request
    pub async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
        let mut builder = self.client.post(self.api_url()).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract the first choice's text
    pub fn extract_text_from_response(response: &ChatCompletionResponse) -> String {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Translator for OpenAI {
    async fn translate(&self, request: TranslationRequest) -> Result<String, ProviderError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        debug!("OpenAI translate: {} chars into {} with {}", request.text.len(), request.target_language, model);

        let mut body = ChatCompletionRequest::new(model);
        if !self.system_prompt.is_empty() {
            body = body.add_message("system", render_system_prompt(&self.system_prompt, &request.target_language));
        }
        body = body.add_message("user", request.text);

        let response = self.complete(body).await?;
        non_empty_translation(Self::extract_text_from_response(&response))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
