//! Structured logging for the bursthunter CLI.
//!
//! Dual-mode output, selected by `BH_LOG_FORMAT`:
//! - Human-readable console output for interactive use (default)
//! - Machine-parseable JSON lines for automation
//!
//! stdout is reserved for burst payloads; all log output goes to stderr.
//! The filter honors `BH_LOG` / `RUST_LOG` over the verbosity flags.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Console format for interactive use.
    #[default]
    Human,
    /// One JSON object per log event.
    Json,
}

/// Logging configuration derived from flags and environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `debug`.
    pub level: &'static str,
    pub format: LogFormat,
}

impl LogConfig {
    /// Derive the configuration from the CLI verbosity flags and the
    /// `BH_LOG_FORMAT` environment variable.
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        };
        let format = match std::env::var("BH_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        LogConfig { level, format }
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Respects the
/// `BH_LOG` and `RUST_LOG` environment variables.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env("BH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("bursthunter={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
