// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use readalong::app_config::{Config, LogLevel, TranslationProvider};
use readalong::reconciler::ReconcileOutcome;
use readalong::{AppError, Controller, ReaderSession};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    OpenAI,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
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

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate paragraphs of a book
    Translate(TranslateArgs),

    /// Narrate paragraphs of a book
    Speak(SpeakArgs),

    /// Attach audio files already on disk to every paragraph
    Reconcile {
        /// Plain-text book
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Inspect or clear the artifact cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions for readalong
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show entry counts and audio library usage
    Stats,

    /// List the audio entries of one document
    Entries {
        /// Document identifier
        #[arg(value_name = "DOCUMENT_ID")]
        document: String,
    },

    /// Remove cached entries
    Clear {
        /// Only clear this document
        #[arg(short, long)]
        document: Option<String>,

        /// Delete generated audio files too
        #[arg(short, long)]
        audio: bool,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Plain-text book
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Paragraph indices to translate
    #[arg(short, long = "paragraph", required = true, num_args = 1..)]
    paragraphs: Vec<usize>,

    /// Target language code (e.g., 'en', 'fr', 'fre')
    #[arg(short, long)]
    language: Option<String>,

    /// Translation provider to use
    #[arg(long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Ignore cached translations and ask the provider again
    #[arg(short, long)]
    retranslate: bool,
}

#[derive(Args, Debug)]
struct SpeakArgs {
    /// Plain-text book
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Paragraph indices to narrate
    #[arg(short, long = "paragraph", required = true, num_args = 1..)]
    paragraphs: Vec<usize>,

    /// TTS voice
    #[arg(long)]
    voice: Option<String>,

    /// TTS model
    #[arg(long)]
    model: Option<String>,

    /// Route requests through the configured TTS proxy
    #[arg(long)]
    proxy: bool,

    /// Ignore existing audio and synthesize again
    #[arg(short, long)]
    regenerate: bool,
}

/// readalong - translate and narrate books paragraph by paragraph
#[derive(Parser, Debug)]
#[command(name = "readalong")]
#[command(version)]
#[command(about = "Paragraph translation and narration with a persistent cache")]
#[command(long_about = "readalong translates and narrates the paragraphs of plain-text books.
Every translation and audio file is cached, so each one is produced once.

EXAMPLES:
    readalong translate book.txt -p 3                  # Translate paragraph 3
    readalong translate book.txt -p 3 4 -l de          # Translate into German
    readalong translate book.txt -p 3 --retranslate    # Ignore the cached translation
    readalong speak book.txt -p 0 --voice nova         # Narrate with another voice
    readalong speak book.txt -p 0 --proxy              # Use the caching TTS proxy
    readalong reconcile book.txt                       # Attach audio already on disk
    readalong cache clear --document <ID> --audio      # Forget one book
    readalong completions bash > readalong.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
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
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Follows set_max_level so the config can adjust it after init
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
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
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "readalong", &mut std::io::stdout());
        return Ok(());
    }

    let cli_log_level: Option<LogLevel> = cli.log_level.clone().map(Into::into);
    if let Some(level) = cli_log_level {
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config_path).map_err(|e| AppError::Config(format!("{:#}", e)))?;
    if let Some(level) = cli_log_level {
        config.log_level = level;
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Speak(args) => run_speak(config, args).await,
        Commands::Reconcile { file } => run_reconcile(config, file).await,
        Commands::Cache { command } => run_cache(config, command).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn open_session(config: Config, file: &Path) -> Result<ReaderSession> {
    config
        .validate()
        .map_err(|e| AppError::Config(format!("{:#}", e)))
        .context("Configuration validation failed")?;
    let controller = Controller::with_config(config)?;
    let reconciler = controller.build_reconciler()?;
    controller.open_session(file, reconciler)
}

async fn run_translate(mut config: Config, args: TranslateArgs) -> Result<()> {
    if let Some(provider) = args.provider {
        config.translation.provider = provider.into();
        config.translation.endpoint.clear();
    }
    if let Some(model) = args.model {
        config.translation.model = model;
    }

    let session = open_session(config, &args.file)?;
    let language = args.language.as_deref();
    let mut failures = 0;

    for index in args.paragraphs {
        session.navigate_to(index)?;
        let result = match (args.retranslate, language) {
            (true, _) => session.retranslate(index).await,
            (false, Some(language)) => session.translate_into(index, language).await,
            (false, None) => session.translate(index).await,
        };

        match result {
            Ok(served) => {
                info!("Paragraph {} ({:?})", index, served.source);
                println!("{}", served.value.text);
            }
            Err(e) => {
                error!("Paragraph {}: {}", index, e);
                failures += 1;
            }
        }
    }

    session.close();
    if failures > 0 {
        anyhow::bail!("{} paragraph(s) failed to translate", failures);
    }
    Ok(())
}

async fn run_speak(mut config: Config, args: SpeakArgs) -> Result<()> {
    if let Some(voice) = args.voice {
        config.speech.voice = voice;
    }
    if let Some(model) = args.model {
        config.speech.model = model;
    }
    if args.proxy {
        config.speech.proxy.enabled = true;
    }

    let session = open_session(config, &args.file)?;
    let mut failures = 0;

    for index in args.paragraphs {
        session.navigate_to(index)?;
        let result = if args.regenerate {
            session.regenerate_audio(index).await
        } else {
            session.speak(index).await
        };

        match result {
            Ok(served) => {
                info!("Paragraph {} ({:?}, {} bytes)", index, served.source, served.value.handle.byte_len());
                println!("{}", served.value.handle.path().display());
            }
            Err(e) => {
                error!("Paragraph {}: {}", index, e);
                failures += 1;
            }
        }
    }

    session.close();
    if failures > 0 {
        anyhow::bail!("{} paragraph(s) failed to synthesize", failures);
    }
    Ok(())
}

async fn run_reconcile(config: Config, file: PathBuf) -> Result<()> {
    let session = open_session(config, &file)?;

    let progress_bar = ProgressBar::new(session.document().len() as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} paragraphs ({percent}%) {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar.set_message("Reconciling audio");

    let summary = session
        .reconcile_rendered_with(|index, result| {
            if let Ok(ReconcileOutcome::Attached(handle)) = result {
                progress_bar.set_message(format!("attached {}", handle.path().display()));
            } else if let Err(e) = result {
                progress_bar.println(format!("Paragraph {}: {}", index, e));
            }
            progress_bar.inc(1);
        })
        .await;
    progress_bar.finish_with_message("Done");

    println!("{}", summary);
    if summary.failed > 0 {
        warn!("{} paragraph(s) could not be reconciled", summary.failed);
    }
    session.close();
    Ok(())
}

async fn run_cache(config: Config, command: CacheCommands) -> Result<()> {
    let controller = Controller::with_config(config)?;

    match command {
        CacheCommands::Stats => {
            let (stats, usage) = controller.cache_stats().await?;
            println!("Translations: {}", stats.translation_entries);
            println!("Audio entries: {}", stats.audio_entries);
            println!("Audio files: {} ({} bytes)", usage.files, usage.bytes);
        }
        CacheCommands::Entries { document } => {
            for (index, entry) in controller.audio_entries(&document).await? {
                println!("{:>5}  {}  {} bytes  {}/{}  {}", index, entry.file_name, entry.byte_len, entry.voice, entry.model, entry.created_at);
            }
        }
        CacheCommands::Clear { document, audio } => {
            let (entries, files) = controller.clear_cache(document.as_deref(), audio).await?;
            println!("Removed {} cache entries and {} audio files", entries, files);
        }
    }
    Ok(())
}
