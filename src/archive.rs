//! Merging grouped media into the year/date library
//!
//! For every year the existing date folders are listed once. A date whose
//! folder already exists is skipped as a whole; otherwise its items are
//! transferred into `library/<year>/<date>/` under their derived names.

use crate::config::{CollisionPolicy, Config, FileOperation};
use crate::error::{Error, Result};
use crate::hash::same_contents;
use crate::media::{Grouping, MediaItem, date_folder_name};
use crate::process::{FileResult, ProcessingStats};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Copy buffer size (256KB)
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Upper bound on numeric suffixes tried for a taken name
const MAX_SUFFIX: u32 = 10_000;

/// Transfers grouped items into the library
pub struct Archiver<'a> {
    config: &'a Config,
}

impl<'a> Archiver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Archive every date in the grouping, returning one result per item
    pub fn archive(&self, grouping: &Grouping, stats: &mut ProcessingStats) -> Vec<FileResult> {
        let mut results = Vec::with_capacity(grouping.len());

        for (year, dates) in grouping.years() {
            let year_dir = self.config.library_dir.join(format!("{:04}", year));

            let existing_dates = match self.existing_dates(&year_dir) {
                Ok(names) => names,
                Err(e) => {
                    error!(?year_dir, error = %e, "Failed to prepare year directory");
                    for item in dates.values().flatten() {
                        stats.failed += 1;
                        results.push(FileResult::failed(item.source_path(), None, &e));
                    }
                    continue;
                }
            };

            for (date, items) in dates {
                let date_name = date_folder_name(*date);

                if existing_dates
                    .iter()
                    .any(|name| self.config.date_match.matches(name, &date_name))
                {
                    info!(count = items.len(), "Skipping media from {}", date_name);
                    stats.dates_skipped += 1;
                    for item in items {
                        stats.skipped += 1;
                        results.push(FileResult::skipped(item));
                    }
                    continue;
                }

                info!(count = items.len(), "Archiving media from {}", date_name);
                stats.dates_archived += 1;

                let date_dir = year_dir.join(&date_name);
                if !self.config.dry_run
                    && let Err(e) = fs::create_dir_all(&date_dir)
                {
                    let e = Error::from(e);
                    error!(?date_dir, error = %e, "Failed to create date directory");
                    for item in items {
                        stats.failed += 1;
                        results.push(FileResult::failed(item.source_path(), None, &e));
                    }
                    continue;
                }

                let mut claimed = HashSet::new();
                for item in items {
                    results.push(self.archive_item(item, &date_dir, &mut claimed, stats));
                }
            }
        }

        results
    }

    /// Ensure the year directory exists and list the date folders inside it
    fn existing_dates(&self, year_dir: &Path) -> Result<Vec<String>> {
        if !year_dir.exists() {
            if self.config.dry_run {
                return Ok(Vec::new());
            }
            fs::create_dir_all(year_dir)?;
            debug!(?year_dir, "Created year directory");
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(year_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn archive_item(
        &self,
        item: &MediaItem,
        date_dir: &Path,
        claimed: &mut HashSet<PathBuf>,
        stats: &mut ProcessingStats,
    ) -> FileResult {
        let source = item.source_path();

        let dest = match resolve_destination(
            date_dir.join(item.archive_filename()),
            self.config.on_collision,
            claimed,
        ) {
            Ok(dest) => dest,
            Err(e) => {
                error!(?source, error = %e, "No free destination name");
                stats.failed += 1;
                return FileResult::failed(source, None, &e);
            }
        };
        claimed.insert(dest.clone());

        if self.config.dry_run {
            info!(?source, destination = ?dest, "Would archive file");
            stats.archived += 1;
            return FileResult::dry_run(item, dest);
        }

        let warning = match transfer(&source, &dest, self.config) {
            Ok(warning) => warning,
            Err(e) => {
                error!(?source, destination = ?dest, error = %e, "Failed to archive file");
                stats.failed += 1;
                return FileResult::failed(source, Some(dest), &e);
            }
        };

        debug!(
            ?source,
            destination = ?dest,
            time_source = ?item.time_source,
            timestamp = %item.timestamp,
            "Archived file"
        );
        stats.archived += 1;
        FileResult::archived(item, dest).with_warning(warning)
    }
}

/// Pick a destination path that is neither on disk nor already claimed
fn resolve_destination(
    path: PathBuf,
    policy: CollisionPolicy,
    claimed: &HashSet<PathBuf>,
) -> Result<PathBuf> {
    let taken = |p: &Path| p.exists() || claimed.contains(p);

    if !taken(&path) {
        return Ok(path);
    }

    if policy == CollisionPolicy::Fail {
        return Err(Error::DestinationExists { path });
    }

    let invalid = || Error::InvalidFileName { path: path.clone() };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(invalid)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let parent = path.parent().ok_or_else(invalid)?;

    for i in 1..MAX_SUFFIX {
        let candidate = parent.join(format!("{}_{}{}", stem, i, extension));
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(Error::DestinationExists { path })
}

/// Move or copy a file into the library according to the configured operation
///
/// Returns a warning when the file reached the library but its source could
/// not be removed afterwards.
fn transfer(source: &Path, dest: &Path, config: &Config) -> Result<Option<String>> {
    match config.operation {
        FileOperation::Move => {
            // Rename fails across file systems
            if let Err(e) = fs::rename(source, dest) {
                debug!(?source, error = %e, "Rename failed, copying instead");
                return copy_then_remove(source, dest);
            }
            Ok(None)
        }
        FileOperation::Copy if config.remove_source => copy_then_remove(source, dest),
        FileOperation::Copy => {
            copy_verified(source, dest)?;
            Ok(None)
        }
    }
}

/// Copy with verification, then delete the source
fn copy_then_remove(source: &Path, dest: &Path) -> Result<Option<String>> {
    copy_verified(source, dest)?;

    // The verified copy is in the library, so a source that cannot be
    // deleted leaves the file archived
    match fs::remove_file(source) {
        Ok(()) => {
            debug!(?source, "Removed source after verified copy");
            Ok(None)
        }
        Err(e) => {
            warn!(
                ?source,
                destination = ?dest,
                error = %e,
                "Archived, but the source could not be removed"
            );
            Ok(Some(format!("source not removed: {}", e)))
        }
    }
}

/// Copy a file, keep its modification time and check the copy byte for byte
///
/// The destination must not exist. It is removed again if the copy or its
/// verification fails.
fn copy_verified(source: &Path, dest: &Path) -> Result<()> {
    copy_file(source, dest)?;
    preserve_mtime(source, dest);

    match same_contents(source, dest) {
        Ok(true) => Ok(()),
        Ok(false) => {
            discard(dest);
            Err(Error::VerifyFailed {
                source_path: source.to_path_buf(),
                destination: dest.to_path_buf(),
            })
        }
        Err(e) => {
            discard(dest);
            Err(e)
        }
    }
}

fn preserve_mtime(source: &Path, dest: &Path) {
    let mtime = match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(e) => {
            warn!(?source, error = %e, "Failed to read modification time");
            return;
        }
    };
    if let Err(e) = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime)) {
        warn!(?dest, error = %e, "Failed to preserve modification time");
    }
}

/// Remove a destination this run created but could not complete
fn discard(dest: &Path) {
    if let Err(e) = fs::remove_file(dest) {
        error!(?dest, error = %e, "Failed to remove incomplete copy");
    }
}

/// Copy file with buffered I/O, refusing to overwrite
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let src_file = File::open(source)?;
    let dest_file = OpenOptions::new().write(true).create_new(true).open(dest)?;

    if let Err(e) = stream_copy(src_file, dest_file) {
        discard(dest);
        return Err(e.into());
    }
    Ok(())
}

fn stream_copy(source: File, dest: File) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateMatch;
    use crate::process::ProcessingStatus;
    use crate::time::TimeSource;
    use chrono::NaiveDateTime;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        library: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let source = dir.path().join("camera");
        let library = dir.path().join("library");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&library).unwrap();
        Fixture {
            _dir: dir,
            source,
            library,
        }
    }

    fn media(source_dir: &Path, filename: &str, ts: &str) -> MediaItem {
        fs::write(source_dir.join(filename), filename.as_bytes()).unwrap();
        let (_, extension) = filename.rsplit_once('.').unwrap();
        MediaItem {
            filename: filename.into(),
            extension: extension.to_string(),
            source_dir: source_dir.to_path_buf(),
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            time_source: TimeSource::FileSystem,
        }
    }

    fn run(config: &Config, grouping: &Grouping) -> (Vec<FileResult>, ProcessingStats) {
        let mut stats = ProcessingStats::new();
        let results = Archiver::new(config).archive(grouping, &mut stats);
        (results, stats)
    }

    #[test]
    fn test_moves_into_year_date_folders() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "IMG_0001.jpg", "2023-07-04 10:30:00"));
        grouping.insert(media(&fx.source, "clip.mov", "2023-07-05 08:00:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, stats) = run(&config, &grouping);

        let jpg = fx.library.join("2023/2023-07-04/20230704_103000.jpg");
        let mov = fx.library.join("2023/2023-07-05/20230705_080000.mov");
        assert!(jpg.is_file());
        assert!(mov.is_file());
        assert!(!fx.source.join("IMG_0001.jpg").exists());
        assert!(!fx.source.join("clip.mov").exists());

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == ProcessingStatus::Archived));
        assert_eq!(results[0].destination.as_deref(), Some(jpg.as_path()));
        assert_eq!(stats.archived, 2);
        assert_eq!(stats.dates_archived, 2);
    }

    #[test]
    fn test_existing_date_is_skipped() {
        let fx = fixture();
        let existing = fx.library.join("2022").join("2022-05-01");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("20220501_080000.jpg"), b"old").unwrap();

        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "new.jpg", "2022-05-01 18:00:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, stats) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Skipped);
        assert!(fx.source.join("new.jpg").exists());
        assert_eq!(fs::read_dir(&existing).unwrap().count(), 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.dates_skipped, 1);
    }

    #[test]
    fn test_exact_match_ignores_suffixed_folder() {
        let fx = fixture();
        fs::create_dir_all(fx.library.join("2024").join("2024-01-020-backup")).unwrap();

        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.png", "2024-01-02 12:00:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, _) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert!(fx.library.join("2024/2024-01-02/20240102_120000.png").is_file());
    }

    #[test]
    fn test_contains_match_skips_suffixed_folder() {
        let fx = fixture();
        fs::create_dir_all(fx.library.join("2024").join("2024-01-020-backup")).unwrap();

        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.png", "2024-01-02 12:00:00"));

        let mut config = Config::new(&fx.source, &fx.library);
        config.date_match = DateMatch::Contains;
        let (results, _) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Skipped);
        assert!(fx.source.join("a.png").exists());
        assert!(!fx.library.join("2024/2024-01-02").exists());
    }

    #[test]
    fn test_files_in_year_dir_are_not_dates() {
        let fx = fixture();
        let year_dir = fx.library.join("2024");
        fs::create_dir_all(&year_dir).unwrap();
        fs::write(year_dir.join("2024-03-03"), b"a stray file").unwrap();

        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.gif", "2024-03-03 12:00:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, _) = run(&config, &grouping);

        // Creating the date folder fails because a file holds its name
        assert_eq!(results[0].status, ProcessingStatus::Failed);
        assert!(fx.source.join("a.gif").exists());
    }

    #[test]
    fn test_same_second_gets_suffix() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.jpg", "2023-07-04 10:30:00"));
        grouping.insert(media(&fx.source, "b.jpg", "2023-07-04 10:30:00"));
        grouping.insert(media(&fx.source, "c.jpg", "2023-07-04 10:30:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, _) = run(&config, &grouping);

        let date_dir = fx.library.join("2023/2023-07-04");
        assert_eq!(fs::read(date_dir.join("20230704_103000.jpg")).unwrap(), b"a.jpg");
        assert_eq!(fs::read(date_dir.join("20230704_103000_1.jpg")).unwrap(), b"b.jpg");
        assert_eq!(fs::read(date_dir.join("20230704_103000_2.jpg")).unwrap(), b"c.jpg");
        assert!(results.iter().all(|r| r.status == ProcessingStatus::Archived));
    }

    #[test]
    fn test_fail_policy_keeps_source() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.jpg", "2023-07-04 10:30:00"));
        grouping.insert(media(&fx.source, "b.jpg", "2023-07-04 10:30:00"));

        let mut config = Config::new(&fx.source, &fx.library);
        config.on_collision = CollisionPolicy::Fail;
        let (results, stats) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert_eq!(results[1].status, ProcessingStatus::Failed);
        assert!(results[1].error.as_deref().unwrap().contains("already exists"));
        assert!(fx.source.join("b.jpg").exists());
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_copy_keeps_source_and_mtime() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.mp4", "2023-07-04 10:30:00"));

        let mut config = Config::new(&fx.source, &fx.library);
        config.operation = FileOperation::Copy;
        let (results, _) = run(&config, &grouping);

        let dest = fx.library.join("2023/2023-07-04/20230704_103000.mp4");
        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert!(fx.source.join("a.mp4").exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a.mp4");
        let mtime = |p: &Path| {
            filetime::FileTime::from_last_modification_time(&fs::metadata(p).unwrap())
                .unix_seconds()
        };
        assert_eq!(mtime(&dest), mtime(&fx.source.join("a.mp4")));
    }

    #[test]
    fn test_copy_with_remove_deletes_source() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.mp4", "2023-07-04 10:30:00"));

        let mut config = Config::new(&fx.source, &fx.library);
        config.operation = FileOperation::Copy;
        config.remove_source = true;
        let (results, _) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert!(!fx.source.join("a.mp4").exists());
        assert!(fx.library.join("2023/2023-07-04/20230704_103000.mp4").is_file());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.jpg", "2023-07-04 10:30:00"));
        grouping.insert(media(&fx.source, "b.jpg", "2023-07-04 10:30:00"));

        let mut config = Config::new(&fx.source, &fx.library);
        config.dry_run = true;
        let (results, stats) = run(&config, &grouping);

        assert!(results.iter().all(|r| r.status == ProcessingStatus::DryRun));
        assert_eq!(
            results[1].destination,
            Some(fx.library.join("2023/2023-07-04/20230704_103000_1.jpg"))
        );
        assert!(!fx.library.join("2023").exists());
        assert!(fx.source.join("a.jpg").exists());
        assert_eq!(stats.archived, 2);
    }

    #[test]
    fn test_missing_source_fails_only_that_item() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        let gone = media(&fx.source, "gone.png", "2023-07-04 10:30:00");
        fs::remove_file(gone.source_path()).unwrap();
        grouping.insert(gone);
        grouping.insert(media(&fx.source, "here.png", "2023-07-04 11:00:00"));

        let config = Config::new(&fx.source, &fx.library);
        let (results, stats) = run(&config, &grouping);

        assert_eq!(results[0].status, ProcessingStatus::Failed);
        assert_eq!(results[1].status, ProcessingStatus::Archived);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.archived, 1);
    }

    #[test]
    fn test_resolve_destination() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("20230704_103000.jpg");
        let mut claimed = HashSet::new();

        let first = resolve_destination(base.clone(), CollisionPolicy::Suffix, &claimed).unwrap();
        assert_eq!(first, base);

        fs::write(&base, b"x").unwrap();
        claimed.insert(dir.path().join("20230704_103000_1.jpg"));
        let next = resolve_destination(base.clone(), CollisionPolicy::Suffix, &claimed).unwrap();
        assert_eq!(next, dir.path().join("20230704_103000_2.jpg"));

        let err = resolve_destination(base, CollisionPolicy::Fail, &claimed).unwrap_err();
        assert!(matches!(err, Error::DestinationExists { .. }));
    }

    #[test]
    fn test_copy_file_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"new").unwrap();
        fs::write(&b, b"old").unwrap();

        assert!(copy_verified(&a, &b).is_err());
        assert_eq!(fs::read(&b).unwrap(), b"old");
    }

    #[test]
    fn test_failed_copy_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let unreadable = dir.path().join("not_a_file");
        fs::create_dir(&unreadable).unwrap();
        let dest = dir.path().join("20230704_103000.jpg");

        // Opening a directory may succeed, reading from it does not
        assert!(copy_verified(&unreadable, &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_copy_then_remove() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mov");
        let dest = dir.path().join("20230704_103000.mov");
        fs::write(&source, b"moov").unwrap();

        let warning = copy_then_remove(&source, &dest).unwrap();

        assert!(warning.is_none());
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"moov");
    }

    #[test]
    fn test_copy_then_remove_keeps_source_on_copy_failure() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mov");
        let dest = dir.path().join("20230704_103000.mov");
        fs::write(&source, b"moov").unwrap();
        fs::write(&dest, b"taken").unwrap();

        assert!(copy_then_remove(&source, &dest).is_err());
        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"taken");
    }

    /// Make `dir` read-only; false when permissions are not enforced (root)
    #[cfg(unix)]
    fn lock_dir(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let marker = dir.join(".write_test");
        if fs::write(&marker, b"").is_ok() {
            fs::remove_file(&marker).unwrap();
            unlock_dir(dir);
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn unlock_dir(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_move_falls_back_to_copy_and_warns_when_source_stays() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.png", "2023-07-04 10:30:00"));
        // A read-only source directory makes rename fail, while reading
        // for the copy still works
        if !lock_dir(&fx.source) {
            return;
        }

        let config = Config::new(&fx.source, &fx.library);
        let (results, stats) = run(&config, &grouping);
        unlock_dir(&fx.source);

        let dest = fx.library.join("2023/2023-07-04/20230704_103000.png");
        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert!(results[0].warning.as_deref().unwrap().contains("source not removed"));
        assert_eq!(fs::read(&dest).unwrap(), b"a.png");
        assert!(fx.source.join("a.png").exists());
        assert_eq!(stats.archived, 1);
        assert_eq!(stats.failed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_with_remove_warns_when_source_stays() {
        let fx = fixture();
        let mut grouping = Grouping::new();
        grouping.insert(media(&fx.source, "a.mp4", "2023-07-04 10:30:00"));
        if !lock_dir(&fx.source) {
            return;
        }

        let mut config = Config::new(&fx.source, &fx.library);
        config.operation = FileOperation::Copy;
        config.remove_source = true;
        let (results, stats) = run(&config, &grouping);
        unlock_dir(&fx.source);

        assert_eq!(results[0].status, ProcessingStatus::Archived);
        assert!(results[0].warning.is_some());
        assert!(fx.library.join("2023/2023-07-04/20230704_103000.mp4").is_file());
        assert!(fx.source.join("a.mp4").exists());
        assert_eq!(stats.failed, 0);
    }
}
