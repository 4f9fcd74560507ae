//! JSONL logging with per-document context for Quire
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Document Context**: Tag spans with the document a session is working on
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use quire_logging::{LogConfig, QuireSubscriberBuilder};
//!
//! // JSONL to stderr
//! let _guard = QuireSubscriberBuilder::new().init();
//!
//! // Pretty human-readable output
//! let _guard = QuireSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! The returned guard flushes file output when dropped; keep it alive for
//! the life of the program.

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{DocumentContextData, DocumentContextGuard, document_span};
pub use layers::{DocumentContextExtension, DocumentContextLayer, jsonl_layer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Errors from setting up the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log rotation error: {0}")]
    Rotation(#[from] InitError),

    #[error("subscriber already set: {0}")]
    AlreadySet(#[from] TryInitError),
}

/// Builder for configuring and initializing the Quire logging subscriber
pub struct QuireSubscriberBuilder {
    config: LogConfig,
}

impl QuireSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally.
    ///
    /// Failures are reported on stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: failed to initialize logging: {e}");
                None
            }
        }
    }

    /// Try to initialize the subscriber globally.
    ///
    /// Console output goes to stderr so stdout stays free for command
    /// output. The returned guard, if any, keeps the file writer alive.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter_directives()));

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(jsonl_layer(writer, &self.config.jsonl)), Some(guard))
            }
            None => (None, None),
        };

        let console = &self.config.console;
        let pretty_console = (console.enabled && console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(console.ansi)
                .with_target(true)
        });
        let jsonl_console = (console.enabled && !console.pretty)
            .then(|| jsonl_layer(std::io::stderr, &self.config.jsonl));

        Registry::default()
            .with(env_filter)
            .with(DocumentContextLayer::new())
            .with(pretty_console)
            .with(jsonl_console)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

impl Default for QuireSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking writer for a file config. `Never` truncates a single file,
/// the others append to a rolling one.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max) = config.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to stderr)
pub fn init_default() -> Option<WorkerGuard> {
    QuireSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    QuireSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, repeat calls are fine)
pub fn init_testing() {
    let _ = QuireSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
