use anyhow::{anyhow, Context, Result};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::database::DatabaseConnection;
use crate::providers::openai::OPENAI_VOICES;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Text-to-speech config
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Cache database and audio locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI (or any OpenAI-compatible server)
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    fn default_model(&self) -> String {
        match self {
            Self::OpenAI => default_openai_model(),
            Self::Anthropic => default_anthropic_model(),
        }
    }

    fn default_endpoint(&self) -> String {
        match self {
            Self::OpenAI => default_openai_endpoint(),
            Self::Anthropic => default_anthropic_endpoint(),
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model name; empty selects the provider's default
    #[serde(default = "String::new")]
    pub model: String,

    /// API key for the provider
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service endpoint URL; empty selects the provider's public API
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// System prompt template for translation
    /// Placeholder: {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranslationConfig {
    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            self.model.clone()
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint()
        } else {
            self.endpoint.clone()
        }
    }

    /// A custom endpoint may be a local server that needs no key
    fn uses_public_api(&self) -> bool {
        self.endpoint.is_empty() || self.endpoint == self.provider.default_endpoint()
    }
}

/// Text-to-speech configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Voice identifier (e.g., "alloy", "nova")
    #[serde(default = "default_voice")]
    pub voice: String,

    /// TTS model (e.g., "tts-1", "tts-1-hd")
    #[serde(default = "default_tts_model")]
    pub model: String,

    /// API key; falls back to the OpenAI translation key when empty
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Provider base URL; requests go to `<endpoint>/v1/audio/speech`
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,

    /// Local TTS cache proxy
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            model: default_tts_model(),
            api_key: String::new(),
            endpoint: default_speech_endpoint(),
            timeout_secs: default_speech_timeout_secs(),
            proxy: ProxyConfig::default(),
        }
    }
}

/// TTS cache proxy settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProxyConfig {
    /// Route speech requests through the proxy
    #[serde(default)]
    pub enabled: bool,

    /// Proxy base URL
    #[serde(default = "default_proxy_base_url")]
    pub base_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_proxy_base_url(),
        }
    }
}

/// Cache database and audio library settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Keep the cache in SQLite; `false` uses an in-memory store
    #[serde(default = "default_true")]
    pub persist: bool,

    /// SQLite database file; defaults to the user's local data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Audio library root; defaults to the user's local data directory
    #[serde(default)]
    pub audio_dir: Option<PathBuf>,

    /// Bound on one local audio probe in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Paragraphs probed at once by the post-render reconcile pass
    #[serde(default = "default_reconcile_concurrency")]
    pub reconcile_concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: true,
            database_path: None,
            audio_dir: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            reconcile_concurrency: default_reconcile_concurrency(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => DatabaseConnection::default_database_path(),
        }
    }

    pub fn resolved_audio_dir(&self) -> Result<PathBuf> {
        match &self.audio_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(DatabaseConnection::default_data_dir()?.join("audio")),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_speech_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional literary translator. Translate the paragraph you are given into {target_language}. Preserve meaning, tone and punctuation. Reply with the translation only.".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_speech_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_proxy_base_url() -> String {
    "http://127.0.0.1:22999".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_reconcile_concurrency() -> usize {
    8
}

impl Config {
    /// Load the configuration from `path`, writing defaults there when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            return serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// API key used for speech requests
    pub fn speech_api_key(&self) -> String {
        if !self.speech.api_key.is_empty() {
            return self.speech.api_key.clone();
        }
        match self.translation.provider {
            TranslationProvider::OpenAI => self.translation.api_key.clone(),
            TranslationProvider::Anthropic => String::new(),
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.target_language)?;

        // Validate translation settings
        if self.translation.uses_public_api() && self.translation.api_key.is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }
        if self.translation.timeout_secs == 0 {
            return Err(anyhow!("Translation timeout must be positive"));
        }
        parse_http_url(&self.translation.get_endpoint(), "translation endpoint")?;

        // Validate speech settings
        if self.speech.voice.trim().is_empty() || self.speech.model.trim().is_empty() {
            return Err(anyhow!("Speech voice and model must not be empty"));
        }
        if !OPENAI_VOICES.contains(&self.speech.voice.as_str()) {
            // Compatible servers and proxies may offer other voices
            warn!("Voice '{}' is not a standard OpenAI voice", self.speech.voice);
        }
        if self.speech.timeout_secs == 0 {
            return Err(anyhow!("Speech timeout must be positive"));
        }
        parse_http_url(&self.speech.endpoint, "speech endpoint")?;
        if self.speech.proxy.enabled {
            // The proxy may hold its own upstream key
            parse_http_url(&self.speech.proxy.base_url, "proxy base URL")?;
        } else if self.speech_api_key().is_empty() {
            return Err(anyhow!("Speech API key is required unless the TTS proxy is enabled"));
        }

        // Validate storage settings
        if self.storage.probe_timeout_ms == 0 {
            return Err(anyhow!("Probe timeout must be positive"));
        }
        if self.storage.reconcile_concurrency == 0 {
            return Err(anyhow!("Reconcile concurrency must be at least 1"));
        }

        Ok(())
    }
}

/// Parse an http(s) URL from configuration
pub fn parse_http_url(value: &str, what: &str) -> Result<Url> {
    let url = Url::parse(value).with_context(|| format!("Invalid {}: {}", what, value))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("Invalid {} scheme '{}': expected http or https", what, other)),
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
            storage: StorageConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
