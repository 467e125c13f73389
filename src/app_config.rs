use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Generation service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Renderer invocation
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Web front end
    #[serde(default)]
    pub server: ServerConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Generation service type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Scripted responses, for offline runs and tests
    Mock,
}

impl GenerationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Generation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type
    #[serde(rename = "type", default)]
    pub provider_type: GenerationProvider,

    // @field: Model used for video transcription
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    // @field: Model used for scene JSON generation
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    // @field: Model used for script review and syntax repair
    #[serde(default = "default_review_model")]
    pub review_model: String,

    // @field: API key (takes precedence over api_key_env)
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    // @field: Service URL
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for rate-limited or 5xx requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Media larger than this is sent through the file upload API instead of inline
    #[serde(default = "default_inline_media_limit_bytes")]
    pub inline_media_limit_bytes: usize,

    /// Delay between processing-state checks of an uploaded file
    #[serde(default = "default_file_poll_interval_secs")]
    pub file_poll_interval_secs: u64,

    /// Give up waiting for an uploaded file after this many seconds
    #[serde(default = "default_file_poll_max_wait_secs")]
    pub file_poll_max_wait_secs: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: GenerationProvider::default(),
            transcription_model: default_transcription_model(),
            generation_model: default_generation_model(),
            review_model: default_review_model(),
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            endpoint: default_gemini_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            inline_media_limit_bytes: default_inline_media_limit_bytes(),
            file_poll_interval_secs: default_file_poll_interval_secs(),
            file_poll_max_wait_secs: default_file_poll_max_wait_secs(),
            temperature: default_temperature(),
        }
    }
}

impl ProviderConfig {
    /// Get the API key, falling back to the configured environment variable
    pub fn resolve_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }

        if self.api_key_env.is_empty() {
            return String::new();
        }

        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

/// What the service is asked to transcribe from the video
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    /// Only the text written on the sheets
    #[default]
    Visual,
    /// Written text plus the spoken explanation
    VisualAndSpeech,
}

/// Which extracted slide(s) feed the scene generation request
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlideSelection {
    /// The second slide when there is one, otherwise the first
    #[default]
    PreferSecond,
    /// Always the first slide
    First,
    /// Every slide, joined with blank lines
    All,
}

/// Pipeline behaviour configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub transcription_mode: TranscriptionMode,

    #[serde(default)]
    pub slide_selection: SlideSelection,

    /// Upper bound on syntax check / correction rounds for the generated script
    #[serde(default = "default_max_syntax_attempts")]
    pub max_syntax_attempts: u32,

    /// Ask the service to review LaTeX in the generated script before rendering
    #[serde(default)]
    pub latex_review: bool,

    /// Per-run scratch directory root (transcripts, raw responses, scripts)
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcription_mode: TranscriptionMode::default(),
            slide_selection: SlideSelection::default(),
            max_syntax_attempts: default_max_syntax_attempts(),
            latex_review: false,
            work_dir: default_work_dir(),
        }
    }
}

/// Render quality presets understood by the renderer CLI
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderQuality {
    #[default]
    Low,
    Medium,
    High,
    Production,
    Fourk,
}

impl RenderQuality {
    /// Flag passed to the renderer
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Low => "-ql",
            Self::Medium => "-qm",
            Self::High => "-qh",
            Self::Production => "-qp",
            Self::Fourk => "-qk",
        }
    }

    /// Directory name the renderer writes this quality into
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            Self::Low => "480p15",
            Self::Medium => "720p30",
            Self::High => "1080p60",
            Self::Production => "1440p60",
            Self::Fourk => "2160p60",
        }
    }
}

/// Renderer invocation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RendererConfig {
    /// Python interpreter used to run the renderer module
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default)]
    pub quality: RenderQuality,

    /// Scene class emitted into the script and rendered
    #[serde(default = "default_scene_name")]
    pub scene_name: String,

    /// Renderer media output root
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Wall-clock budget for one render
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            quality: RenderQuality::default(),
            scene_name: default_scene_name(),
            media_dir: default_media_dir(),
            timeout_secs: default_render_timeout_secs(),
        }
    }
}

/// Web front end configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Where accepted uploads are stored
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Where finished videos are published as `<id>.mp4`
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    /// Runs beyond this limit wait in the pending state
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Finished runs are forgotten after this many seconds
    #[serde(default = "default_run_retention_secs")]
    pub run_retention_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            processed_dir: default_processed_dir(),
            max_upload_mb: default_max_upload_mb(),
            max_concurrent_runs: default_max_concurrent_runs(),
            run_retention_secs: default_run_retention_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
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
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_transcription_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_review_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Upper bound for transport retries; backoff doubles per retry
pub const MAX_RETRY_COUNT: u32 = 10;

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_inline_media_limit_bytes() -> usize {
    // The inline request body limit is 20 MB; base64 inflates by a third
    15 * 1024 * 1024
}

fn default_file_poll_interval_secs() -> u64 {
    5
}

fn default_file_poll_max_wait_secs() -> u64 {
    600
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_syntax_attempts() -> u32 {
    5
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_scene_name() -> String {
    "GeneratedScene".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_render_timeout_secs() -> u64 {
    900
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("media/videos")
}

fn default_max_upload_mb() -> usize {
    512
}

fn default_max_concurrent_runs() -> usize {
    2
}

fn default_run_retention_secs() -> u64 {
    3600
}

impl Config {
    /// Load the configuration file, writing the defaults first when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type == GenerationProvider::Gemini
            && self.provider.resolve_api_key().is_empty()
        {
            return Err(anyhow!(
                "Gemini API key is required (set provider.api_key or the {} environment variable)",
                self.provider.api_key_env
            ));
        }

        if self.provider.retry_count > MAX_RETRY_COUNT {
            return Err(anyhow!("provider.retry_count must be at most {}", MAX_RETRY_COUNT));
        }

        if self.pipeline.max_syntax_attempts == 0 {
            return Err(anyhow!("pipeline.max_syntax_attempts must be at least 1"));
        }

        if self.renderer.timeout_secs == 0 {
            return Err(anyhow!("renderer.timeout_secs must be greater than zero"));
        }

        if !is_python_identifier(&self.renderer.scene_name) {
            return Err(anyhow!("Invalid scene name: {}", self.renderer.scene_name));
        }

        if self.server.max_concurrent_runs == 0 {
            return Err(anyhow!("server.max_concurrent_runs must be at least 1"));
        }

        Ok(())
    }

    /// Maximum accepted upload body in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn is_python_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
