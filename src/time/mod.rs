//! Capture time resolution
//!
//! A file's capture time comes from:
//! - the EXIF `DateTimeOriginal` tag, for extensions configured to carry EXIF
//! - otherwise the file system modification time, in local time

pub mod exif;

use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Source of the resolved timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// EXIF original capture tag
    Exif,
    /// File system modification time
    FileSystem,
}

/// Result of timestamp resolution
#[derive(Debug, Clone)]
pub struct ResolvedTime {
    pub timestamp: NaiveDateTime,
    pub source: TimeSource,
}

/// Resolve the capture time of a media file
pub fn resolve_timestamp(path: &Path, extension: &str, config: &Config) -> Result<ResolvedTime> {
    if config.reads_exif(extension) {
        if let Some(timestamp) = exif::read_original_datetime(path)? {
            debug!(?path, %timestamp, "Using EXIF capture time");
            return Ok(ResolvedTime {
                timestamp,
                source: TimeSource::Exif,
            });
        }
        debug!(?path, "No usable EXIF capture time, using modification time");
    }

    Ok(ResolvedTime {
        timestamp: modified_local(path)?,
        source: TimeSource::FileSystem,
    })
}

/// File modification time converted to local wall-clock time
fn modified_local(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)?.modified()?;
    let local: DateTime<Local> = modified.into();
    Ok(local.naive_local())
}

#[cfg(test)]
pub(crate) fn set_local_mtime(path: &Path, timestamp: &str) {
    use chrono::TimeZone;

    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").unwrap();
    let local = Local.from_local_datetime(&naive).single().unwrap();
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(local.timestamp(), 0))
        .unwrap();
}
