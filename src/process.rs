//! Run driver: scan the source tree, then archive into the library
//!
//! Every file the run touches ends up as a [`FileResult`]. Failures on one
//! file never abort the run; they are collected and reported at the end.

use crate::archive::Archiver;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::MediaItem;
use crate::scanner::Scanner;
use crate::time::TimeSource;
use std::path::PathBuf;
use tracing::{Level, info, span};

/// Result of processing a single file
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file path
    pub source: PathBuf,
    /// Destination file path (if one was chosen)
    pub destination: Option<PathBuf>,
    /// Where the capture time came from
    pub time_source: Option<TimeSource>,
    /// Processing status
    pub status: ProcessingStatus,
    /// Error message (if failed)
    pub error: Option<String>,
    /// Problem that did not stop the file from being archived
    pub warning: Option<String>,
}

impl FileResult {
    pub fn archived(item: &MediaItem, destination: PathBuf) -> Self {
        Self::for_item(item, Some(destination), ProcessingStatus::Archived)
    }

    pub fn dry_run(item: &MediaItem, destination: PathBuf) -> Self {
        Self::for_item(item, Some(destination), ProcessingStatus::DryRun)
    }

    pub fn skipped(item: &MediaItem) -> Self {
        Self::for_item(item, None, ProcessingStatus::Skipped)
    }

    pub fn failed(source: PathBuf, destination: Option<PathBuf>, error: &Error) -> Self {
        Self {
            source,
            destination,
            time_source: None,
            status: ProcessingStatus::Failed,
            error: Some(error.to_string()),
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    fn for_item(item: &MediaItem, destination: Option<PathBuf>, status: ProcessingStatus) -> Self {
        Self {
            source: item.source_path(),
            destination,
            time_source: Some(item.time_source),
            status,
            error: None,
            warning: None,
        }
    }
}

/// Status of file processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// File was transferred into the library
    Archived,
    /// File's date is already archived
    Skipped,
    /// Processing failed
    Failed,
    /// Dry run - would have archived
    DryRun,
}

/// Processing statistics
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    /// Qualifying media files found by the scan
    pub total_files: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dates_archived: usize,
    pub dates_skipped: usize,
    /// Unreadable entries of the source tree
    pub scan_errors: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Archived: {}, Skipped: {}, Failed: {}, Dates archived: {}, Dates skipped: {}, Scan errors: {}",
            self.total_files,
            self.archived,
            self.skipped,
            self.failed,
            self.dates_archived,
            self.dates_skipped,
            self.scan_errors
        )
    }
}

/// Main processor for archiving media files
pub struct Processor {
    config: Config,
    stats: ProcessingStats,
}

impl Processor {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stats: ProcessingStats::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the scan and archive stages
    ///
    /// Only a missing source or library directory fails the run as a whole.
    pub fn run(&mut self) -> Result<Vec<FileResult>> {
        let _span = span!(Level::INFO, "archive_run").entered();

        for dir in [&self.config.source_dir, &self.config.library_dir] {
            if !dir.is_dir() {
                return Err(Error::MissingDirectory { path: dir.clone() });
            }
        }

        self.stats = ProcessingStats::new();

        info!(source = %self.config.source_dir.display(), "Scanning source directory...");
        let outcome = Scanner::new(&self.config).scan(&self.config.source_dir);
        self.stats.scan_errors = outcome.walk_errors;
        self.stats.failed = outcome.failures.len() - outcome.walk_errors;
        self.stats.total_files = outcome.grouping.len() + self.stats.failed;

        let mut results = outcome.failures;
        if outcome.grouping.is_empty() {
            info!("No media files to archive");
        } else {
            info!(library = %self.config.library_dir.display(), "Archiving into library...");
            let archived = Archiver::new(&self.config).archive(&outcome.grouping, &mut self.stats);
            results.extend(archived);
        }

        info!("{}", self.stats.summary());
        info!("Archiving complete");

        Ok(results)
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }
}
