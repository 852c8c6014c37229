//! Media items and their year/date grouping

use crate::config::Config;
use crate::time::TimeSource;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Return the extension of a qualifying file, or `None` if it does not qualify
///
/// The extension is the final dot-separated segment of the file name.
/// Dot-files such as `.jpg` have no extension.
pub fn qualifying_extension<'a>(path: &'a Path, config: &Config) -> Option<&'a str> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|ext| config.is_supported(ext))
}

/// A media file discovered in the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Original file name, which need not be valid UTF-8
    pub filename: OsString,
    /// Final suffix of the file name
    pub extension: String,
    /// Directory containing the file
    pub source_dir: PathBuf,
    /// Resolved capture time
    pub timestamp: NaiveDateTime,
    /// Where the capture time came from
    pub time_source: TimeSource,
}

impl MediaItem {
    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(&self.filename)
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    pub fn capture_date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Library file name: `YYYYMMDD_HHMMSS.ext`
    pub fn archive_filename(&self) -> String {
        format!("{}.{}", self.timestamp.format("%Y%m%d_%H%M%S"), self.extension)
    }
}

/// Items bucketed by year, then by capture date
///
/// Items keep the order they were inserted in.
#[derive(Debug, Default)]
pub struct Grouping {
    years: BTreeMap<i32, BTreeMap<NaiveDate, Vec<MediaItem>>>,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: MediaItem) {
        self.years
            .entry(item.year())
            .or_default()
            .entry(item.capture_date())
            .or_default()
            .push(item);
    }

    pub fn years(&self) -> impl Iterator<Item = (i32, &BTreeMap<NaiveDate, Vec<MediaItem>>)> {
        self.years.iter().map(|(year, dates)| (*year, dates))
    }

    #[cfg(test)]
    pub(crate) fn items_on(&self, date: NaiveDate) -> &[MediaItem] {
        self.years
            .get(&date.year())
            .and_then(|dates| dates.get(&date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of items across all buckets
    pub fn len(&self) -> usize {
        self.years
            .values()
            .flat_map(|dates| dates.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Format a date the way library folders are named
pub fn date_folder_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn item(filename: &str, ts: &str) -> MediaItem {
        let (_, extension) = filename.rsplit_once('.').unwrap();
        MediaItem {
            filename: filename.into(),
            extension: extension.to_string(),
            source_dir: PathBuf::from("/camera"),
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            time_source: TimeSource::FileSystem,
        }
    }

    #[test]
    fn test_qualifying_extension() {
        let config = Config::new("src", "lib");
        assert_eq!(qualifying_extension(Path::new("IMG_0001.jpg"), &config), Some("jpg"));
        assert_eq!(qualifying_extension(Path::new("clip.final.mov"), &config), Some("mov"));
        assert_eq!(qualifying_extension(Path::new("IMG_0001.JPG"), &config), None);
        assert_eq!(qualifying_extension(Path::new("notes.txt"), &config), None);
        assert_eq!(qualifying_extension(Path::new("README"), &config), None);
        assert_eq!(qualifying_extension(Path::new(".jpg"), &config), None);
        assert_eq!(qualifying_extension(Path::new("photo.jpg.txt"), &config), None);
    }

    #[test]
    fn test_archive_filename() {
        let item = item("IMG_0001.jpg", "2023-07-04 10:30:00");
        assert_eq!(item.archive_filename(), "20230704_103000.jpg");
        assert_eq!(item.year(), 2023);
        assert_eq!(date_folder_name(item.capture_date()), "2023-07-04");
        assert_eq!(item.source_path(), PathBuf::from("/camera/IMG_0001.jpg"));
    }

    #[test]
    fn test_grouping_buckets() {
        let mut grouping = Grouping::new();
        assert!(grouping.is_empty());

        grouping.insert(item("b.jpg", "2022-05-01 09:15:30"));
        grouping.insert(item("a.mov", "2022-05-02 20:00:00"));
        grouping.insert(item("c.png", "2022-05-01 07:00:00"));
        grouping.insert(item("d.gif", "2021-12-31 23:59:59"));

        assert_eq!(grouping.len(), 4);
        let years: Vec<i32> = grouping.years().map(|(y, _)| y).collect();
        assert_eq!(years, vec![2021, 2022]);

        let may_first = NaiveDate::from_ymd_opt(2022, 5, 1).unwrap();
        let names: Vec<&OsStr> = grouping
            .items_on(may_first)
            .iter()
            .map(|i| i.filename.as_os_str())
            .collect();
        // Insertion order is kept within a date
        assert_eq!(names, vec![OsStr::new("b.jpg"), OsStr::new("c.png")]);

        let empty = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(grouping.items_on(empty).is_empty());
    }
}
