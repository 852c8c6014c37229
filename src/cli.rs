//! CLI argument parsing with clap

use crate::config::{Config, FileOperation};
use clap::Parser;
use std::path::PathBuf;

/// Media Archiver - file photos and videos into a year/date library
///
/// Reads a JSON configuration naming a source directory and a library,
/// resolves each media file's capture time from EXIF or its modification
/// time, and moves it to library/YYYY/YYYY-MM-DD/YYYYMMDD_HHMMSS.ext.
/// Dates that already have a folder in the library are skipped.
#[derive(Parser, Debug)]
#[command(name = "media-archiver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(required_unless_present = "sample_config")]
    pub config: Option<PathBuf>,

    /// Remove source files after a verified copy
    ///
    /// Only meaningful with `"operation": "copy"`; moves always remove.
    #[arg(long)]
    pub remove: bool,

    /// Dry run mode - show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the log to this file
    #[arg(long, env = "MEDIA_ARCHIVER_LOG")]
    pub log_file: Option<PathBuf>,

    /// Write the log file as JSON
    #[arg(long, requires = "log_file")]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,
}

impl Cli {
    /// Apply command-line overrides to a loaded configuration
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if self.remove {
            config.remove_source = true;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        config
    }

    /// Whether `--remove` was given but has nothing to do
    pub fn remove_is_redundant(&self, config: &Config) -> bool {
        self.remove && config.operation == FileOperation::Move
    }
}
