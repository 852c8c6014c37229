//! Media Archiver - files photos and videos into a year/date library
//!
//! Loads a JSON configuration, scans the source directory and merges the
//! media into the library, then prints a summary of the run.

use anyhow::Result;
use clap::Parser;
use media_archiver::{Cli, Config, ConfigError, FileResult, Processor, ProcessingStatus};
use std::path::Path;
use tracing::{Level, debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code for a run where some files failed
const EXIT_FAILED: i32 = 1;
/// Exit code for configuration problems
const EXIT_CONFIG: i32 = 2;

// CLI Output Module
mod cli_output {
    //! Colored console output for the run summary

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(60))));
    }

    pub fn print_title(title: &str) {
        let _ = stdout().execute(Print(style(title).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(key).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(style(value).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print one processed file: status icon, source, then destination or message
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(status_icon).with(status_color).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(source).italic()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(dest_or_msg).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let guard = setup_logging(&cli)?;
    let code = run(&cli);

    // Flush the log file before exiting
    drop(guard);

    match code? {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

/// Load the configuration, archive, and report; returns the exit code
fn run(cli: &Cli) -> Result<i32> {
    info!(version = env!("CARGO_PKG_VERSION"), "Media Archiver starting");

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            cli_output::print_error(&e.to_string());
            return Ok(EXIT_CONFIG);
        }
    };

    if cli.remove_is_redundant(&config) {
        warn!("--remove has no extra effect when files are moved");
    }
    debug!(?config, "Configuration loaded");

    let mut processor = Processor::new(config);
    match processor.run() {
        Ok(results) => {
            print_summary(cli, &processor, &results);
            if results.iter().any(|r| r.status == ProcessingStatus::Failed) {
                Ok(EXIT_FAILED)
            } else {
                Ok(0)
            }
        }
        Err(e) => {
            error!(error = %e, "Archiving failed");
            cli_output::print_error(&e.to_string());
            Ok(EXIT_FAILED)
        }
    }
}

/// Load the configuration file named on the command line
fn load_config(cli: &Cli) -> std::result::Result<Config, ConfigError> {
    let path = cli.config.as_deref().unwrap_or(Path::new(""));
    info!(config_file = %path.display(), "Loading configuration from file");
    let config = Config::load_from_file(path)?;
    Ok(cli.merge_with_config(config))
}

/// Print the end-of-run summary
fn print_summary(cli: &Cli, processor: &Processor, results: &[FileResult]) {
    use cli_output::*;

    let stats = processor.stats();

    print_separator();
    print_title("Archiving complete");
    print_separator();

    print_blank();
    print_stat("Archived", &stats.archived.to_string(), CliTheme::SUCCESS);
    print_stat("Skipped", &stats.skipped.to_string(), CliTheme::WARNING);
    print_stat("Failed", &stats.failed.to_string(), CliTheme::ERROR);
    print_stat("Dates archived", &stats.dates_archived.to_string(), CliTheme::ACCENT);
    print_stat("Dates skipped", &stats.dates_skipped.to_string(), CliTheme::ACCENT);
    if stats.scan_errors > 0 {
        print_stat("Unreadable entries", &stats.scan_errors.to_string(), CliTheme::ERROR);
    }
    print_blank();

    if cli.verbose {
        print_separator();
        for result in results.iter().filter(|r| r.status != ProcessingStatus::Failed) {
            let source = result.source.display().to_string();
            let dest = result
                .destination
                .as_ref()
                .map(|p| format!("→ {}", p.display()))
                .unwrap_or_default();
            match result.status {
                ProcessingStatus::Archived => print_result("✓", CliTheme::SUCCESS, &source, &dest),
                ProcessingStatus::DryRun => print_result("~", CliTheme::ACCENT, &source, &dest),
                ProcessingStatus::Skipped => {
                    print_result("⊘", CliTheme::WARNING, &source, "date already archived")
                }
                ProcessingStatus::Failed => {}
            }
        }
    }

    let warned: Vec<_> = results.iter().filter(|r| r.warning.is_some()).collect();
    if !warned.is_empty() {
        print_separator();
        print_warning(&format!("{} files archived with warnings", warned.len()));
        print_blank();
        for result in warned {
            print_result(
                "⚠",
                CliTheme::WARNING,
                &result.source.display().to_string(),
                result.warning.as_deref().unwrap_or_default(),
            );
        }
    }

    let failed: Vec<_> = results
        .iter()
        .filter(|r| r.status == ProcessingStatus::Failed)
        .collect();

    if !failed.is_empty() {
        print_separator();
        print_error(&format!("{} files failed", failed.len()));
        print_blank();
        for result in failed {
            print_result(
                "✗",
                CliTheme::ERROR,
                &result.source.display().to_string(),
                result.error.as_deref().unwrap_or("unknown error"),
            );
        }
    }

    if processor.config().dry_run {
        print_separator();
        print_warning("Dry run: no files were moved or copied");
    }
}

/// Setup logging: console always, plus an optional log file
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr));

    let Some(log_path) = &cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}
