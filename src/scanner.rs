//! Source tree scanning

use crate::config::Config;
use crate::error::Error;
use crate::media::{Grouping, MediaItem, qualifying_extension};
use crate::process::FileResult;
use crate::time::resolve_timestamp;
use std::path::Path;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Items found by a scan plus the files that could not be read
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub grouping: Grouping,
    pub failures: Vec<FileResult>,
    /// Entries of the tree that could not be read, such as unreadable
    /// directories; each one also has a failure result
    pub walk_errors: usize,
}

/// Walks a source directory and groups qualifying files by capture date
pub struct Scanner<'a> {
    config: &'a Config,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Scan `source_dir` recursively
    ///
    /// A file that fails timestamp resolution is reported as a failure and
    /// left out of the grouping; the scan carries on with the rest. Symlinks
    /// to files are scanned, symlinks to directories are not descended.
    pub fn scan(&self, source_dir: &Path) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        for entry in WalkDir::new(source_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(source_dir).to_path_buf();
                    error!(?path, error = %e, "Failed to read directory entry");
                    outcome.walk_errors += 1;
                    outcome
                        .failures
                        .push(FileResult::failed(path, None, &Error::from(e)));
                    continue;
                }
            };

            let path = entry.path();
            // WalkDir reports links as links; follow them only to decide
            // whether they point at a file
            if entry.path_is_symlink() {
                if !path.is_file() {
                    debug!(?path, "Skipping link that does not point to a file");
                    continue;
                }
            } else if !entry.file_type().is_file() {
                continue;
            }

            let Some(extension) = qualifying_extension(path, self.config) else {
                debug!(?path, "Skipping non-media file");
                continue;
            };

            match self.build_item(path, extension) {
                Ok(item) => outcome.grouping.insert(item),
                Err(e) => {
                    error!(?path, error = %e, "Failed to resolve capture time");
                    outcome
                        .failures
                        .push(FileResult::failed(path.to_path_buf(), None, &e));
                }
            }
        }

        info!(
            found = outcome.grouping.len(),
            failed = outcome.failures.len(),
            walk_errors = outcome.walk_errors,
            "Scan finished"
        );
        outcome
    }

    fn build_item(&self, path: &Path, extension: &str) -> crate::error::Result<MediaItem> {
        let invalid = || Error::InvalidFileName {
            path: path.to_path_buf(),
        };
        let filename = path.file_name().ok_or_else(invalid)?.to_os_string();
        let source_dir = path.parent().ok_or_else(invalid)?.to_path_buf();

        let resolved = resolve_timestamp(path, extension, self.config)?;
        debug!(?path, timestamp = %resolved.timestamp, source = ?resolved.source, "Found media file");

        Ok(MediaItem {
            filename,
            extension: extension.to_string(),
            source_dir,
            timestamp: resolved.timestamp,
            time_source: resolved.source,
        })
    }
}
