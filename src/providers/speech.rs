/*!
 * TTS request routing.
 *
 * The adapter sends speech requests either straight to the provider or
 * through a local TTS cache proxy. Both routes carry the same JSON body to
 * `<base>/v1/audio/speech` and share one response path; the proxy route
 * additionally names the file the proxy should cache the result under.
 * The route is never part of any cache key.
 */

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::audio::filename::sanitize_preferred_key;
use crate::errors::ProviderError;
use crate::providers::{SpeechRequest, SpeechSynthesizer};

/// Header naming the proxy cache entry to store the audio under
pub const PREFERRED_CACHE_KEY_HEADER: &str = "X-Preferred-Cache-Key";

/// Header the proxy answers with (`HIT` or `MISS`)
pub const CACHE_STATUS_HEADER: &str = "X-Cache";

const SPEECH_PATH: &str = "v1/audio/speech";

/// Where speech requests go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechRoute {
    Direct,
    Proxy,
}

impl fmt::Display for SpeechRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxy => write!(f, "proxy"),
        }
    }
}

/// Cache status reported by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyCacheStatus {
    Hit,
    Miss,
}

/// Audio returned by either route
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    pub audio: Bytes,
    pub route: SpeechRoute,
    /// Only set when the proxy reported it
    pub cache_status: Option<ProxyCacheStatus>,
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Speech client that routes directly or through the cache proxy
#[derive(Debug, Clone)]
pub struct TtsAdapter {
    client: Client,
    api_key: String,
    direct_base: Url,
    proxy_base: Option<Url>,
}

impl TtsAdapter {
    /// Adapter talking to the provider at `direct_base`
    pub fn new(api_key: impl Into<String>, direct_base: Url) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            direct_base,
            proxy_base: None,
        }
    }

    /// Send every request through the proxy at `proxy_base`
    pub fn with_proxy(mut self, proxy_base: Url) -> Self {
        self.proxy_base = Some(proxy_base);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder().timeout(timeout).build().unwrap_or_default();
        self
    }

    pub fn route(&self) -> SpeechRoute {
        if self.proxy_base.is_some() {
            SpeechRoute::Proxy
        } else {
            SpeechRoute::Direct
        }
    }

    /// Endpoint the current route posts to
    pub fn endpoint(&self) -> Result<Url, ProviderError> {
        let base = self.proxy_base.as_ref().unwrap_or(&self.direct_base);
        speech_url(base)
    }

    /// Synthesize one paragraph over the current route
    pub async fn speak(&self, request: &SpeechRequest) -> Result<SpeechResponse, ProviderError> {
        let route = self.route();
        let endpoint = self.endpoint()?;
        let body = SpeechBody {
            model: &request.model,
            input: &request.text,
            voice: &request.voice,
            response_format: "mp3",
        };

        info!("TTS request via {} route to {} ({} chars, voice {})", route, endpoint, request.text.len(), request.voice);

        let mut builder = self
            .client
            .post(endpoint)
            .header("Accept", "audio/mpeg")
            .json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        if route == SpeechRoute::Proxy {
            if let Some(key) = request.preferred_key.as_deref().and_then(sanitize_preferred_key) {
                builder = builder.header(PREFERRED_CACHE_KEY_HEADER, key);
            }
        }

        let response = builder.send().await.map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("TTS API error ({}) via {} route: {}", status, route, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let cache_status = match response.headers().get(CACHE_STATUS_HEADER).and_then(|v| v.to_str().ok()) {
            Some(v) if v.eq_ignore_ascii_case("hit") => Some(ProxyCacheStatus::Hit),
            Some(v) if v.eq_ignore_ascii_case("miss") => Some(ProxyCacheStatus::Miss),
            _ => None,
        };
        if let Some(status) = cache_status {
            debug!("TTS proxy reported {:?} for {:?}", status, request.preferred_key);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if let Some(content_type) = content_type {
            if !content_type.starts_with("audio/") && !content_type.starts_with("application/octet-stream") {
                return Err(ProviderError::ParseError(format!("Unexpected TTS content type: {}", content_type)));
            }
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        if audio.is_empty() {
            return Err(ProviderError::ParseError("TTS provider returned no audio".to_string()));
        }

        Ok(SpeechResponse {
            audio,
            route,
            cache_status,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsAdapter {
    async fn synthesize(&self, request: SpeechRequest) -> Result<Bytes, ProviderError> {
        self.speak(&request).await.map(|response| response.audio)
    }
}

fn speech_url(base: &Url) -> Result<Url, ProviderError> {
    // Url::join drops the last path segment unless the base ends with '/'
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(SPEECH_PATH)
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid speech endpoint {}: {}", base, e)))
}
