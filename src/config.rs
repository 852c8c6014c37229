//! Configuration types for the media archiver

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// How an existing date folder is matched against a candidate date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DateMatch {
    /// Skip only when a folder is named exactly `YYYY-MM-DD`
    #[default]
    Exact,
    /// Skip when any folder name contains `YYYY-MM-DD`
    /// (tolerates suffixed folders such as `2024-01-02 Beach`)
    Contains,
}

impl DateMatch {
    /// Check whether an existing folder name counts as the given date
    pub fn matches(&self, folder_name: &str, date: &str) -> bool {
        match self {
            DateMatch::Exact => folder_name == date,
            DateMatch::Contains => folder_name.contains(date),
        }
    }
}

/// File operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// Rename into the library, falling back to copy + verify + delete
    #[default]
    Move,
    /// Copy into the library and verify the copy
    Copy,
}

/// What to do when the derived destination name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Append `_1`, `_2`, ... to the file stem
    #[default]
    Suffix,
    /// Fail the item and leave the source untouched
    Fail,
}

/// On-disk configuration file layout
///
/// `source` and `library` are optional here so that missing keys can be
/// reported individually instead of as a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub source: Option<PathBuf>,
    pub library: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub exif_extensions: Option<Vec<String>>,
    pub date_match: DateMatch,
    pub operation: FileOperation,
    pub remove_source: bool,
    pub on_collision: CollisionPolicy,
    pub dry_run: bool,
}

/// Validated configuration for a run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for media
    pub source_dir: PathBuf,

    /// Root of the year/date library
    pub library_dir: PathBuf,

    /// Qualifying extensions, matched case-sensitively
    pub extensions: Vec<String>,

    /// Extensions whose EXIF capture time is consulted
    pub exif_extensions: Vec<String>,

    /// Policy for recognising already archived dates
    pub date_match: DateMatch,

    /// How files are transferred into the library
    pub operation: FileOperation,

    /// Delete sources after a verified copy
    pub remove_source: bool,

    /// Handling of taken destination names
    pub on_collision: CollisionPolicy,

    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
}

fn default_extensions() -> Vec<String> {
    vec![
        "jpg".into(),
        "gif".into(),
        "png".into(),
        "mp4".into(),
        "mov".into(),
    ]
}

fn default_exif_extensions() -> Vec<String> {
    vec!["jpg".into()]
}

impl Config {
    /// Create a configuration with default policies for the given directories
    pub fn new(source_dir: impl Into<PathBuf>, library_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            library_dir: library_dir.into(),
            extensions: default_extensions(),
            exif_extensions: default_exif_extensions(),
            date_match: DateMatch::default(),
            operation: FileOperation::default(),
            remove_source: false,
            on_collision: CollisionPolicy::default(),
            dry_run: false,
        }
    }

    /// Check if a file extension qualifies for archiving
    pub fn is_supported(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Check if EXIF metadata should be read for this extension
    pub fn reads_exif(&self, ext: &str) -> bool {
        self.exif_extensions.iter().any(|e| e == ext)
    }

    /// Load and validate configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        Self::from_file(file)
    }

    /// Validate a parsed configuration file
    ///
    /// Both `source` and `library` must be present and name existing
    /// directories. Every problem is collected before failing.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let source_dir = check_directory("source", file.source, &mut problems);
        let library_dir = check_directory("library", file.library, &mut problems);

        let (Some(source_dir), Some(library_dir)) = (source_dir, library_dir) else {
            return Err(ConfigError::Invalid { problems });
        };

        let mut config = Config::new(source_dir, library_dir);
        if let Some(extensions) = file.extensions {
            config.extensions = extensions;
        }
        if let Some(exif_extensions) = file.exif_extensions {
            config.exif_extensions = exif_extensions;
        }
        config.date_match = file.date_match;
        config.operation = file.operation;
        config.remove_source = file.remove_source;
        config.on_collision = file.on_collision;
        config.dry_run = file.dry_run;

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"{
    "source": "D:/Camera",
    "library": "D:/Library",
    "extensions": ["jpg", "gif", "png", "mp4", "mov"],
    "exif_extensions": ["jpg"],
    "date_match": "exact",
    "operation": "move",
    "remove_source": false,
    "on_collision": "suffix",
    "dry_run": false
}
"#
        .to_string()
    }
}

fn check_directory(
    field: &'static str,
    value: Option<PathBuf>,
    problems: &mut Vec<ConfigProblem>,
) -> Option<PathBuf> {
    match value {
        None => {
            problems.push(ConfigProblem::Missing(field));
            None
        }
        Some(path) if path.as_os_str().is_empty() => {
            problems.push(ConfigProblem::Missing(field));
            None
        }
        Some(path) if !path.is_dir() => {
            problems.push(ConfigProblem::NotADirectory(field, path));
            None
        }
        Some(path) => Some(path),
    }
}

/// A single problem found while validating the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    /// Required key absent or empty
    Missing(&'static str),
    /// Key present but not an existing directory
    NotADirectory(&'static str, PathBuf),
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigProblem::Missing(field) => write!(f, " {}: is missing", field),
            ConfigProblem::NotADirectory(field, path) => {
                write!(f, " {} directory is invalid ({})", field, path.display())
            }
        }
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file does not exist
    NotFound { path: PathBuf },
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Required fields missing or invalid
    Invalid { problems: Vec<ConfigProblem> },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound { path } => {
                write!(f, "File \"{}\" did not exist!", path.display())
            }
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::Invalid { problems } => {
                write!(f, "Problem with configuration file.")?;
                for problem in problems {
                    write!(f, "\n{}", problem)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::NotFound { .. } | ConfigError::Invalid { .. } => None,
        }
    }
}
