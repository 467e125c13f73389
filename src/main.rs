// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use mathcast::app_config::{self, Config, GenerationProvider};
use mathcast::errors::AppError;
use mathcast::file_utils::FileManager;
use mathcast::pipeline::{Pipeline, compose_script};
use mathcast::server;

/// CLI Wrapper for GenerationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Gemini,
    Mock,
}

impl From<CliProvider> for GenerationProvider {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Gemini => GenerationProvider::Gemini,
            CliProvider::Mock => GenerationProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the upload / download web front end
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the whole pipeline on a local video
    Run {
        /// Lecture video (.webm or .mp4)
        #[arg(value_name = "VIDEO")]
        video: PathBuf,

        /// Where to put the rendered animation
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Turn a saved scene response into a Manim script, offline
    Script {
        /// File holding the service's raw scene response
        #[arg(value_name = "RESPONSE_FILE")]
        response_file: PathBuf,

        /// Where to write the script
        #[arg(short, long, default_value = "generated_scene.py")]
        output: PathBuf,
    },

    /// Generate shell completions for mathcast
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// mathcast - hand-written math lectures to Manim animations
#[derive(Parser, Debug)]
#[command(name = "mathcast")]
#[command(version = "0.1.0")]
#[command(about = "Turn hand-written math lecture videos into Manim animations")]
#[command(long_about = "mathcast transcribes a lecture video with a generative-AI service, restructures it into a scene and renders it with Manim.

EXAMPLES:
    mathcast serve                              # Start the web front end
    mathcast run lecture.webm -o lecture.mp4    # One-shot run on a local file
    mathcast script response.txt                # Repair a saved response into a script
    mathcast completions bash > mathcast.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. The Gemini API key is read from provider.api_key
    or from the GEMINI_API_KEY environment variable.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Generation provider to use
    #[arg(short, long, global = true, value_enum)]
    provider: Option<CliProvider>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Everything up to Trace reaches the logger; max_level does the filtering
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "mathcast", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config)?;
    if let Some(provider) = &cli.provider {
        config.provider.provider_type = provider.clone().into();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            validate(&config)?;
            server::start_server(Pipeline::from_config(config)).await
        }
        Commands::Run { video, output } => {
            validate(&config)?;
            Ok(run_once(config, video, output).await?)
        }
        Commands::Script { response_file, output } => Ok(write_script(&config, &response_file, &output)?),
        Commands::Completions { .. } => Ok(()),
    }
}

fn validate(config: &Config) -> Result<(), AppError> {
    config
        .validate()
        .map_err(|e| AppError::Config(format!("Configuration validation failed: {:#}", e)))
}

async fn run_once(config: Config, video: PathBuf, output: Option<PathBuf>) -> Result<(), AppError> {
    if !FileManager::file_exists(&video) {
        return Err(AppError::File(format!("Input video does not exist: {:?}", video)));
    }

    let pipeline = Pipeline::from_config(config);
    let run_id = uuid::Uuid::new_v4().to_string();

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("uploaded");

    let result = pipeline
        .run(&run_id, &video, |stage| spinner.set_message(stage.to_string()))
        .await;
    spinner.finish_and_clear();

    let published = match result {
        Ok(path) => path,
        Err(e) => {
            error!("Run {} failed: {}", run_id, e);
            return Err(e.into());
        }
    };

    let final_path = match output {
        Some(output) => {
            FileManager::move_file(&published, &output).map_err(|e| AppError::File(format!("{:#}", e)))?;
            output
        }
        None => published,
    };

    info!("Success: {:?}", final_path);
    Ok(())
}

fn write_script(config: &Config, response_file: &PathBuf, output: &PathBuf) -> Result<(), AppError> {
    let raw = FileManager::read_to_string(response_file).map_err(|e| AppError::File(format!("{:#}", e)))?;
    let (record, script) = compose_script(&raw, &config.renderer.scene_name)?;

    FileManager::write_to_file(output, script.as_str()).map_err(|e| AppError::File(format!("{:#}", e)))?;
    info!(
        "Wrote scene '{}' with {} element(s) to {:?}",
        record.title,
        record.elements.len(),
        output
    );
    Ok(())
}
