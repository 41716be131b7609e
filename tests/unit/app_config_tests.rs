/*!
 * Tests for application configuration functionality
 */

use std::str::FromStr;

use anyhow::Result;
use log::LevelFilter;

use readalong::app_config::{parse_http_url, Config, LogLevel, TranslationProvider};
use crate::common;

fn valid_config() -> Config {
    let mut config = Config::default();
    config.translation.api_key = "sk-test".to_string();
    config
}

/// Test provider specific defaults
#[test]
fn test_translationConfig_withEmptyFields_shouldUseProviderDefaults() {
    let mut config = Config::default();
    assert_eq!(config.translation.get_endpoint(), "https://api.openai.com/v1");

    config.translation.provider = TranslationProvider::Anthropic;
    assert_eq!(config.translation.get_model(), "claude-3-haiku-20240307");
    assert_eq!(config.translation.get_endpoint(), "https://api.anthropic.com");

    config.translation.model = "claude-3-5-sonnet".to_string();
    assert_eq!(config.translation.get_model(), "claude-3-5-sonnet");
    assert!(config.translation.system_prompt.contains("{target_language}"));
}

/// Test that a local OpenAI-compatible server needs no key
#[test]
fn test_validate_withCustomEndpoint_shouldNotRequireTranslationKey() {
    let mut config = Config::default();
    config.translation.endpoint = "http://localhost:1234/v1".to_string();
    config.speech.api_key = "sk-speech".to_string();
    assert!(config.validate().is_ok());
}

/// Test that the speech key falls back to the OpenAI translation key
#[test]
fn test_speechApiKey_shouldFallBackToOpenAiKey() {
    let mut config = valid_config();
    assert_eq!(config.speech_api_key(), "sk-test");

    config.speech.api_key = "sk-speech".to_string();
    assert_eq!(config.speech_api_key(), "sk-speech");

    config.speech.api_key.clear();
    config.translation.provider = TranslationProvider::Anthropic;
    assert_eq!(config.speech_api_key(), "");
}

/// Test rejection of non-positive limits
#[test]
fn test_validate_withZeroLimits_shouldFail() {
    let mut config = valid_config();
    config.storage.probe_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.storage.reconcile_concurrency = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.speech.timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.speech.voice = " ".to_string();
    assert!(config.validate().is_err());
}

/// Test URL parsing for configured endpoints
#[test]
fn test_parseHttpUrl_shouldAcceptOnlyHttpSchemes() {
    assert!(parse_http_url("http://127.0.0.1:22999", "proxy").is_ok());
    assert!(parse_http_url("https://api.openai.com", "speech").is_ok());
    assert!(parse_http_url("file:///tmp/x", "speech").is_err());
    assert!(parse_http_url("not a url", "speech").is_err());
}

/// Test provider name parsing and display
#[test]
fn test_translationProvider_fromStr_shouldRoundTripNames() {
    assert_eq!(TranslationProvider::from_str("OpenAI").unwrap(), TranslationProvider::OpenAI);
    assert_eq!(TranslationProvider::from_str("anthropic").unwrap(), TranslationProvider::Anthropic);
    assert!(TranslationProvider::from_str("ollama").is_err());
    assert_eq!(TranslationProvider::Anthropic.to_string(), "anthropic");
    assert_eq!(TranslationProvider::OpenAI.display_name(), "OpenAI");
}

/// Test log level mapping
#[test]
fn test_logLevel_toLevelFilter_shouldMapEveryLevel() {
    assert_eq!(LogLevel::Error.to_level_filter(), LevelFilter::Error);
    assert_eq!(LogLevel::Info.to_level_filter(), LevelFilter::Info);
    assert_eq!(LogLevel::Trace.to_level_filter(), LevelFilter::Trace);
    assert_eq!(LogLevel::default(), LogLevel::Info);
}

/// Test saving and reloading a customised configuration
#[test]
fn test_save_thenLoad_shouldPreserveSettings() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let mut config = valid_config();
    config.target_language = "de".to_string();
    config.speech.voice = "nova".to_string();
    config.speech.proxy.enabled = true;
    config.storage.audio_dir = Some(dir.path().join("audio"));
    config.save(&path)?;

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded, config);
    assert_eq!(loaded.storage.resolved_audio_dir()?, dir.path().join("audio"));
    Ok(())
}

/// Test that a malformed file is reported instead of replaced
#[test]
fn test_loadOrCreate_withMalformedFile_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    assert_eq!(std::fs::read_to_string(path)?, "{ not json");
    Ok(())
}
