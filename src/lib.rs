//! Media Archiver - files photos and videos into a year/date library
//!
//! The library provides:
//! - Capture time resolution from EXIF `DateTimeOriginal` or file modification time
//! - Source tree scanning into a year/date grouping
//! - Merging into `library/YYYY/YYYY-MM-DD/`, skipping dates already archived
//! - Per-file results so one bad file never stops a run

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod media;
pub mod process;
pub mod scanner;
pub mod time;

pub use archive::Archiver;
pub use cli::Cli;
pub use config::{CollisionPolicy, Config, ConfigError, DateMatch, FileOperation};
pub use error::{Error, Result};
pub use media::{Grouping, MediaItem};
pub use process::{FileResult, ProcessingStats, ProcessingStatus, Processor};
pub use scanner::Scanner;
