//! Burst Hunter - sliding-window burst detection over event captures.
//!
//! The entry point validates the threshold bounds, then fans out one
//! scanner thread per capture file. Scanners own their state and share
//! nothing; completed bursts stream over an mpsc channel to this thread,
//! which renders them to stdout as they arrive. Logs go to stderr, so
//! stdout carries only burst payloads.

use bh_common::{Error, ErrorCategory, OutputFormat};
use bh_core::config::ScanConfig;
use bh_core::exit_codes::ExitCode;
use bh_core::logging::{init_logging, LogConfig};
use bh_core::scan::{Burst, FieldKey, JsonlSource, ScanError, Scanner};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{error, info, warn};

/// Burst Hunter - find bursts of keyed events in capture files
#[derive(Parser)]
#[command(name = "bursthunter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Window length in seconds to count events over
    #[arg(short = 'i', long, default_value_t = 60)]
    interval: u32,

    /// Number of events within the window that make a burst
    #[arg(short = 'c', long, default_value_t = 10)]
    count: u32,

    /// Comma-separated record fields joined into the grouping key
    #[arg(long, value_name = "FIELDS", value_delimiter = ',', default_value = "src,dst")]
    key_fields: Vec<String>,

    /// Only consider records where FIELD equals VALUE; repeatable
    #[arg(long = "require", value_name = "FIELD=VALUE")]
    require: Vec<String>,

    /// Output format for burst reports
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long)]
    quiet: bool,

    /// JSONL capture files to scan
    #[arg(value_name = "CAPTURE")]
    captures: Vec<PathBuf>,
}

/// One emitted burst, tagged with the capture it came from.
struct Report {
    capture: PathBuf,
    burst: Burst,
}

/// JSON rendering of a report: one object per line on stdout.
#[derive(Serialize)]
struct JsonReport<'a> {
    capture: &'a Path,
    key: &'a str,
    first: Option<i64>,
    last: Option<i64>,
    events: Vec<u64>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_flags(cli.verbose, cli.quiet));
    match run(cli) {
        Ok(code) => code.into(),
        Err(err) => {
            error!("{err}");
            match err.category() {
                ErrorCategory::Config => ExitCode::ArgsError.into(),
                _ => ExitCode::InternalError.into(),
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Error> {
    let config = ScanConfig {
        interval: cli.interval,
        count: cli.count,
    };
    config.validate()?;
    if cli.captures.is_empty() {
        return Err(Error::NoCaptures);
    }
    let key = build_key(cli.key_fields, &cli.require)?;

    info!(
        "looking for bursts of {} events within {} seconds",
        config.count, config.interval
    );

    // One scanner per capture, each on its own thread with its own state.
    let (reports, inbox) = mpsc::channel::<Report>();
    let mut workers = Vec::with_capacity(cli.captures.len());
    for capture in cli.captures {
        let reports = reports.clone();
        let key = key.clone();
        workers.push(thread::spawn(move || {
            scan_capture(&capture, config, key, &reports)
        }));
    }
    drop(reports);

    let mut bursts = 0usize;
    for report in inbox {
        bursts += 1;
        render(&report, cli.format);
    }

    let mut failed = 0usize;
    for worker in workers {
        match worker.join() {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(_) => {
                error!("scanner thread panicked");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Ok(ExitCode::PartialFail)
    } else if bursts > 0 {
        Ok(ExitCode::BurstsFound)
    } else {
        Ok(ExitCode::Clean)
    }
}

fn build_key(fields: Vec<String>, require: &[String]) -> Result<FieldKey, Error> {
    if fields.is_empty() {
        return Err(Error::NoKeyFields);
    }
    let mut key = FieldKey::new(fields);
    for filter in require {
        let Some((field, value)) = filter.split_once('=') else {
            return Err(Error::MalformedFilter {
                got: filter.clone(),
            });
        };
        key = key.require(field, value);
    }
    Ok(key)
}

/// Scan one capture to exhaustion, streaming bursts to the consumer.
///
/// Failures are logged here and reported as `false`; sibling scanners
/// keep running.
fn scan_capture(
    path: &Path,
    config: ScanConfig,
    key: FieldKey,
    reports: &mpsc::Sender<Report>,
) -> bool {
    if path.is_dir() {
        info!(capture = %path.display(), "skipping directory");
        return true;
    }
    let source = match JsonlSource::open(path) {
        Ok(source) => source,
        Err(err) => {
            let err = Error::Capture(err.to_string());
            error!(capture = %path.display(), category = %err.category(), "cannot open capture: {err}");
            return false;
        }
    };
    let mut scanner = Scanner::new(source, key, config);
    loop {
        match scanner.next_burst() {
            Ok(Some(burst)) => {
                let report = Report {
                    capture: path.to_path_buf(),
                    burst,
                };
                if reports.send(report).is_err() {
                    warn!(capture = %path.display(), "report channel closed early");
                    return false;
                }
            }
            Ok(None) => return true,
            Err(err) => {
                let err = classify(&err);
                error!(capture = %path.display(), category = %err.category(), "scan failed: {err}");
                return false;
            }
        }
    }
}

/// Map a scan failure onto the shared error taxonomy. Broken timestamp
/// ordering is a contract violation, everything else an input error.
fn classify(err: &ScanError) -> Error {
    match err {
        ScanError::OutOfOrder { .. } => Error::Contract(err.to_string()),
        _ => Error::Capture(err.to_string()),
    }
}

fn render(report: &Report, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!(
                "Burst found in capture {}:\n{}\n",
                report.capture.display(),
                report.burst
            );
        }
        OutputFormat::Json => {
            let line = JsonReport {
                capture: &report.capture,
                key: &report.burst.key,
                first: report.burst.first_timestamp(),
                last: report.burst.last_timestamp(),
                events: report.burst.sequence_numbers().collect(),
            };
            match serde_json::to_string(&line) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("failed to encode burst report: {err}"),
            }
        }
    }
}
