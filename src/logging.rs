//! Logging initialisation.
//!
//! Logs go to stderr so the console report on stdout stays clean. The
//! filter comes from `RUST_LOG` when set, otherwise from `--log-level`.

use std::io;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

/// Log verbosity accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Default filter directive: `warn` for dependencies, `level` for this crate.
pub fn default_directive(level: Level) -> String {
    format!("warn,release_herald={},tower_http={}", level, level)
}

pub fn init(level: LogLevel, format: LogFormat) -> anyhow::Result<()> {
    let level: Level = level.into();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .json();
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
    }

    Ok(())
}
