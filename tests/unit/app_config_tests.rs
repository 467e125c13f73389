/*!
 * Tests for application configuration
 */

use anyhow::Result;
use log::LevelFilter;
use mathcast::app_config::{
    Config, GenerationProvider, LogLevel, MAX_RETRY_COUNT, RenderQuality, SlideSelection, TranscriptionMode,
};
use crate::common;

/// Test that defaults match the documented values
#[test]
fn test_default_config_shouldHaveDocumentedValues() {
    let config = Config::default();

    assert_eq!(config.provider.provider_type, GenerationProvider::Gemini);
    assert_eq!(config.provider.api_key_env, "GEMINI_API_KEY");
    assert_eq!(config.pipeline.max_syntax_attempts, 5);
    assert_eq!(config.pipeline.slide_selection, SlideSelection::PreferSecond);
    assert_eq!(config.pipeline.transcription_mode, TranscriptionMode::Visual);
    assert!(!config.pipeline.latex_review);
    assert_eq!(config.renderer.scene_name, "GeneratedScene");
    assert_eq!(config.renderer.quality, RenderQuality::Low);
    assert_eq!(config.renderer.timeout_secs, 900);
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.processed_dir.to_string_lossy(), "media/videos");
    assert_eq!(config.server.run_retention_secs, 3600);
}

/// Test that a partial file falls back to defaults for missing fields
#[test]
fn test_load_or_create_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "provider": {"type": "mock", "generation_model": "custom-model"},
            "pipeline": {"slide_selection": "all", "transcription_mode": "visual_and_speech"},
            "renderer": {"quality": "high"},
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.provider.provider_type, GenerationProvider::Mock);
    assert_eq!(config.provider.generation_model, "custom-model");
    assert_eq!(config.provider.transcription_model, "gemini-1.5-pro");
    assert_eq!(config.pipeline.slide_selection, SlideSelection::All);
    assert_eq!(config.pipeline.transcription_mode, TranscriptionMode::VisualAndSpeech);
    assert_eq!(config.renderer.quality, RenderQuality::High);
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.log_level, LogLevel::Debug);
    Ok(())
}

/// Test that a missing file is created with the defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded.server.port, config.server.port);
    assert_eq!(reloaded.renderer.scene_name, config.renderer.scene_name);
    Ok(())
}

/// Test that invalid JSON is reported rather than replaced
#[test]
fn test_load_or_create_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Test that Gemini without any key fails validation
#[test]
fn test_validate_withGeminiAndNoKey_shouldFail() {
    let mut config = Config::default();
    config.provider.api_key = String::new();
    config.provider.api_key_env = String::new();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("API key"));
}

/// Test that an explicit key satisfies validation
#[test]
fn test_validate_withExplicitKey_shouldPass() {
    let mut config = Config::default();
    config.provider.api_key = "secret".to_string();

    assert!(config.validate().is_ok());
    assert_eq!(config.provider.resolve_api_key(), "secret");
}

/// Test that the mock provider needs no key
#[test]
fn test_validate_withMockProvider_shouldNotRequireKey() {
    let mut config = Config::default();
    config.provider.provider_type = GenerationProvider::Mock;
    config.provider.api_key_env = String::new();

    assert!(config.validate().is_ok());
}

/// Test the numeric and naming constraints
#[test]
fn test_validate_withBadValues_shouldFail() {
    let mut base = Config::default();
    base.provider.provider_type = GenerationProvider::Mock;

    let mut config = base.clone();
    config.pipeline.max_syntax_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = base.clone();
    config.renderer.timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = base.clone();
    config.renderer.scene_name = "1Scene".to_string();
    assert!(config.validate().is_err());

    let mut config = base.clone();
    config.renderer.scene_name = "My Scene".to_string();
    assert!(config.validate().is_err());

    let mut config = base.clone();
    config.server.max_concurrent_runs = 0;
    assert!(config.validate().is_err());

    let mut config = base;
    config.provider.retry_count = 65;
    assert!(config.validate().is_err());
}

/// Test the upper bound on transport retries
#[test]
fn test_validate_withRetryCountAtLimit_shouldPass() {
    let mut config = Config::default();
    config.provider.provider_type = GenerationProvider::Mock;
    config.provider.retry_count = MAX_RETRY_COUNT;
    assert!(config.validate().is_ok());

    config.provider.retry_count = MAX_RETRY_COUNT + 1;
    assert!(config.validate().is_err());
}

/// Test provider parsing and display
#[test]
fn test_generationProvider_fromStr_shouldBeCaseInsensitive() {
    assert_eq!("Gemini".parse::<GenerationProvider>().unwrap(), GenerationProvider::Gemini);
    assert_eq!("MOCK".parse::<GenerationProvider>().unwrap(), GenerationProvider::Mock);
    assert!("openai".parse::<GenerationProvider>().is_err());
    assert_eq!(GenerationProvider::Gemini.to_string(), "gemini");
    assert_eq!(GenerationProvider::Mock.display_name(), "Mock");
}

/// Test the renderer quality mapping
#[test]
fn test_renderQuality_shouldMapFlagsAndFolders() {
    assert_eq!(RenderQuality::Low.flag(), "-ql");
    assert_eq!(RenderQuality::Low.output_dir_name(), "480p15");
    assert_eq!(RenderQuality::High.flag(), "-qh");
    assert_eq!(RenderQuality::High.output_dir_name(), "1080p60");
}

#[test]
fn test_logLevel_toLevelFilter_shouldMatch() {
    assert_eq!(LogLevel::Warn.to_level_filter(), LevelFilter::Warn);
    assert_eq!(LogLevel::default().to_level_filter(), LevelFilter::Info);
}

#[test]
fn test_maxUploadBytes_shouldConvertMegabytes() {
    let mut config = Config::default();
    config.server.max_upload_mb = 2;
    assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
}
