//! Error types for the media archiver

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media archiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Directory does not exist: {path}")]
    MissingDirectory { path: PathBuf },

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("Copy verification failed: {source_path} -> {destination}")]
    VerifyFailed {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("Invalid file name: {path}")]
    InvalidFileName { path: PathBuf },
}
