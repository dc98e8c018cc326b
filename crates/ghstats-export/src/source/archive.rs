//! GH Archive file reader.
//!
//! Reads the hourly archive layout:
//!
//! ```text
//! <raw>/<year>/<year>-<MM>-<DD>-<H>.json.gz
//! ```
//!
//! Files are visited in chronological order, each gzip stream is decoded line
//! by line, and every line becomes one [`Event`]. Events whose ID was already
//! yielded are skipped silently. Malformed lines are logged and skipped.

use super::SourceStats;
use crate::dedupe::{DEFAULT_DEDUPE_CAPACITY, DedupeIndex, DedupeStats};
use crate::{Error, Result};
use flate2::read::MultiGzDecoder;
use ghstats_core::Event;
use ghstats_core::memory::{format_bytes, process_memory};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which part of the archive to read.
///
/// `year: None` is the `*` wildcard and selects every year directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSelector {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl ArchiveSelector {
    /// Build a selector from CLI-style values (`year` may be `*`).
    pub fn parse(year: &str, month: Option<u32>, day: Option<u32>) -> Result<Self> {
        let year = match year.trim() {
            "*" => None,
            y => Some(
                y.parse::<i32>()
                    .map_err(|_| Error::InvalidSelector(format!("year '{y}' is not a number or '*'")))?,
            ),
        };
        let selector = Self { year, month, day };
        selector.validate()?;
        Ok(selector)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(month) = self.month
            && !(1..=12).contains(&month)
        {
            return Err(Error::InvalidSelector(format!("month {month} is out of range")));
        }
        if let Some(day) = self.day {
            if self.month.is_none() {
                return Err(Error::InvalidSelector(
                    "a day requires a month".to_string(),
                ));
            }
            if !(1..=31).contains(&day) {
                return Err(Error::InvalidSelector(format!("day {day} is out of range")));
            }
        }
        Ok(())
    }

    /// File name prefix within one year directory.
    fn file_prefix(&self, year: &str) -> String {
        let mut prefix = year.to_string();
        if let Some(month) = self.month {
            prefix.push_str(&format!("-{month:02}"));
        }
        if let Some(day) = self.day {
            prefix.push_str(&format!("-{day:02}"));
        }
        prefix
    }

    /// Short label for output file names: `2024`, `2024-03`, `all-03-01`.
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => self.file_prefix(&year.to_string()),
            None => self.file_prefix("all"),
        }
    }
}

/// Configuration for the archive source.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Root of the archive (contains one directory per year).
    pub raw_path: PathBuf,

    /// Year/month/day selection.
    pub selector: ArchiveSelector,

    /// Event IDs retained for deduplication before eviction.
    pub dedupe_capacity: usize,

    /// Progress reporting interval (events).
    pub progress_interval: usize,

    /// Limit number of files to process (for testing).
    pub limit: Option<usize>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("raw"),
            selector: ArchiveSelector::default(),
            dedupe_capacity: DEFAULT_DEDUPE_CAPACITY,
            progress_interval: 100_000,
            limit: None,
        }
    }
}

/// The file currently being decoded.
struct OpenFile {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    line_number: usize,
}

/// Lazy, single-pass reader over the selected archive files.
pub struct ArchiveSource {
    config: ArchiveConfig,
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<OpenFile>,
    line_buf: Vec<u8>,
    dedupe: DedupeIndex,
    stats: SourceStats,
}

impl ArchiveSource {
    /// Enumerate the selected files.
    ///
    /// Fails before any event is read if the selector is invalid or the
    /// archive root (or the selected year) does not exist.
    pub fn open(config: ArchiveConfig) -> Result<Self> {
        config.selector.validate()?;
        let files = Self::collect_files(&config)?;
        if files.is_empty() {
            warn!(
                "No archive files match {} under {}",
                config.selector.label(),
                config.raw_path.display()
            );
        } else {
            info!("Found {} archive files to process", files.len());
        }
        Ok(Self::from_files(files, config))
    }

    /// Read an explicit list of files, in the given order.
    pub fn from_files(files: Vec<PathBuf>, config: ArchiveConfig) -> Self {
        let dedupe = DedupeIndex::new(config.dedupe_capacity);
        let stats = SourceStats {
            files_total: files.len(),
            ..Default::default()
        };
        Self {
            config,
            files,
            next_file: 0,
            current: None,
            line_buf: Vec::with_capacity(16 * 1024),
            dedupe,
            stats,
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    pub fn dedupe_stats(&self) -> DedupeStats {
        self.dedupe.stats()
    }

    /// Collect files to process, sorted chronologically.
    fn collect_files(config: &ArchiveConfig) -> Result<Vec<PathBuf>> {
        let root = &config.raw_path;
        if !root.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Archive path does not exist: {}", root.display()),
            )));
        }

        let year_dirs = match config.selector.year {
            Some(year) => {
                let dir = root.join(year.to_string());
                if !dir.is_dir() {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("No archive directory for {year}: {}", dir.display()),
                    )));
                }
                vec![dir]
            }
            None => {
                let mut dirs: Vec<_> = fs::read_dir(root)?
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.is_dir()
                            && p.file_name()
                                .and_then(|n| n.to_str())
                                .is_some_and(|n| n.parse::<i32>().is_ok())
                    })
                    .collect();
                dirs.sort();
                dirs
            }
        };

        let mut files = Vec::new();
        for dir in year_dirs {
            let year = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let prefix = config.selector.file_prefix(&year);

            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let matches = path.is_file()
                    && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| {
                        n.starts_with(&prefix) && (n.ends_with(".json.gz") || n.ends_with(".json"))
                    });
                if matches {
                    files.push(path);
                }
            }
        }

        files.sort_by_cached_key(|p| chronological_sort_key(p));

        if let Some(limit) = config.limit {
            files.truncate(limit);
        }

        Ok(files)
    }

    /// Open the next file. Returns `false` when all files are consumed.
    fn open_next_file(&mut self) -> Result<bool> {
        let Some(path) = self.files.get(self.next_file).cloned() else {
            return Ok(false);
        };
        self.next_file += 1;

        info!(
            "[{}/{}] Processing: {}",
            self.next_file,
            self.files.len(),
            path.display()
        );

        let file = File::open(&path).map_err(|e| with_path(&path, e))?;
        self.stats.bytes_read += file.metadata().map_err(|e| with_path(&path, e))?.len();

        let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
        let reader: Box<dyn BufRead> = if is_gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
        } else {
            Box::new(BufReader::new(file))
        };

        self.current = Some(OpenFile {
            path,
            reader,
            line_number: 0,
        });
        Ok(true)
    }

    fn report_progress(&self) {
        info!(
            "Progress: {} events, {} unique, {} duplicates, {} malformed, {} ids retained, memory {}",
            self.stats.total_events,
            self.stats.unique_events,
            self.stats.duplicate_events,
            self.stats.parse_errors,
            self.dedupe.len(),
            format_bytes(process_memory())
        );
    }
}

impl Iterator for ArchiveSource {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                match self.open_next_file() {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            let file = self.current.as_mut()?;

            self.line_buf.clear();
            match file.reader.read_until(b'\n', &mut self.line_buf) {
                Ok(0) => {
                    self.current = None;
                    self.stats.files_processed += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    let err = with_path(&file.path, e);
                    self.current = None;
                    return Some(Err(Error::Io(err)));
                }
            }

            file.line_number += 1;
            self.stats.total_lines += 1;

            let line = self.line_buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let event = match Event::from_slice(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "{}:{}: JSON parse error: {}",
                        file.path.display(),
                        file.line_number,
                        e
                    );
                    self.stats.parse_errors += 1;
                    continue;
                }
            };

            self.stats.total_events += 1;
            if self.stats.total_events.is_multiple_of(self.config.progress_interval) {
                self.report_progress();
            }

            if !self.dedupe.check_and_mark(&event.id) {
                self.stats.duplicate_events += 1;
                continue;
            }

            self.stats.unique_events += 1;
            return Some(Ok(event));
        }
    }
}

/// Sort key that orders hourly files chronologically.
///
/// Archive hours are not zero-padded (`2024-01-01-9.json.gz`), so the hour
/// is padded to two digits before comparing. Directory components are kept
/// so files of different years never interleave.
pub fn chronological_sort_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = name.split_at(name.find('.').unwrap_or(name.len()));

    let normalized = match stem.rsplit_once('-') {
        Some((head, hour)) if hour.len() == 1 && hour.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{head}-0{hour}{ext}")
        }
        _ => name.clone(),
    };

    match path.parent() {
        Some(parent) => parent.join(normalized).to_string_lossy().into_owned(),
        None => normalized,
    }
}

fn with_path(path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn event_line(id: u32, created_at: &str) -> String {
        format!(
            r#"{{"id":"{id}","type":"WatchEvent","created_at":"{created_at}","actor":{{"login":"u{id}"}},"repo":{{"name":"o/r"}},"payload":{{"action":"started"}}}}"#
        )
    }

    fn write_gz(path: &Path, lines: &[String]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap();
    }

    fn config_for(root: &Path, selector: ArchiveSelector) -> ArchiveConfig {
        ArchiveConfig {
            raw_path: root.to_path_buf(),
            selector,
            ..Default::default()
        }
    }

    fn ids(source: ArchiveSource) -> Vec<String> {
        source.map(|e| e.unwrap().id).collect()
    }

    #[test]
    fn test_sort_key_pads_single_digit_hours() {
        let nine = chronological_sort_key(Path::new("raw/2024/2024-01-01-9.json.gz"));
        let ten = chronological_sort_key(Path::new("raw/2024/2024-01-01-10.json.gz"));
        assert!(nine < ten);
        assert!(nine.ends_with("2024-01-01-09.json.gz"));
        assert!(ten.ends_with("2024-01-01-10.json.gz"));
    }

    #[test]
    fn test_files_sorted_chronologically() {
        let tmp = TempDir::new().unwrap();
        let year = tmp.path().join("2024");
        for hour in [10, 9, 0, 23, 1] {
            write_gz(&year.join(format!("2024-01-01-{hour}.json.gz")), &[]);
        }
        write_gz(&year.join("2024-01-02-0.json.gz"), &[]);

        let source = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("2024", None, None).unwrap(),
        ))
        .unwrap();

        let names: Vec<_> = source
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "2024-01-01-0.json.gz",
                "2024-01-01-1.json.gz",
                "2024-01-01-9.json.gz",
                "2024-01-01-10.json.gz",
                "2024-01-01-23.json.gz",
                "2024-01-02-0.json.gz",
            ]
        );
    }

    #[test]
    fn test_month_and_day_narrow_selection() {
        let tmp = TempDir::new().unwrap();
        let year = tmp.path().join("2024");
        write_gz(&year.join("2024-01-05-0.json.gz"), &[]);
        write_gz(&year.join("2024-02-05-0.json.gz"), &[]);
        write_gz(&year.join("2024-02-06-0.json.gz"), &[]);

        let month = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("2024", Some(2), None).unwrap(),
        ))
        .unwrap();
        assert_eq!(month.files().len(), 2);

        let day = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("2024", Some(2), Some(6)).unwrap(),
        ))
        .unwrap();
        assert_eq!(day.files().len(), 1);
    }

    #[test]
    fn test_year_wildcard_spans_years_in_order() {
        let tmp = TempDir::new().unwrap();
        write_gz(&tmp.path().join("2023/2023-12-31-23.json.gz"), &[event_line(1, "2023-12-31T23:59:59Z")]);
        write_gz(&tmp.path().join("2024/2024-01-01-0.json.gz"), &[event_line(2, "2024-01-01T00:00:00Z")]);
        fs::create_dir_all(tmp.path().join("notes")).unwrap();

        let source = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("*", None, None).unwrap(),
        ))
        .unwrap();
        assert_eq!(ids(source), ["1", "2"]);
    }

    #[test]
    fn test_duplicates_across_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let year = tmp.path().join("2024");
        write_gz(
            &year.join("2024-01-01-0.json.gz"),
            &[event_line(1, "2024-01-01T00:00:01Z"), event_line(2, "2024-01-01T00:59:59Z")],
        );
        write_gz(
            &year.join("2024-01-01-1.json.gz"),
            &[
                event_line(2, "2024-01-01T00:59:59Z"),
                event_line(2, "2024-01-01T00:59:59Z"),
                event_line(3, "2024-01-01T01:00:00Z"),
            ],
        );

        let mut source = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("2024", None, None).unwrap(),
        ))
        .unwrap();
        let seen: Vec<_> = source.by_ref().map(|e| e.unwrap().id).collect();
        assert_eq!(seen, ["1", "2", "3"]);

        let stats = source.stats();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.unique_events, 3);
        assert_eq!(stats.duplicate_events, 2);
    }

    #[test]
    fn test_malformed_and_blank_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2024/2024-01-01-0.json.gz");
        write_gz(
            &path,
            &[
                event_line(1, "2024-01-01T00:00:01Z"),
                "{not json".to_string(),
                String::new(),
                r#"{"id":"9","type":"X","created_at":"yesterday"}"#.to_string(),
                event_line(2, "2024-01-01T00:00:02Z"),
            ],
        );

        let mut source = ArchiveSource::from_files(vec![path], ArchiveConfig::default());
        let seen: Vec<_> = source.by_ref().map(|e| e.unwrap().id).collect();
        assert_eq!(seen, ["1", "2"]);
        assert_eq!(source.stats().parse_errors, 2);
        assert_eq!(source.stats().total_lines, 5);
    }

    #[test]
    fn test_plain_json_files_are_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2024-01-01-0.json");
        fs::write(&path, format!("{}\n", event_line(5, "2024-01-01T00:00:00Z"))).unwrap();

        let source = ArchiveSource::from_files(vec![path], ArchiveConfig::default());
        assert_eq!(ids(source), ["5"]);
    }

    #[test]
    fn test_missing_root_fails_at_setup() {
        let tmp = TempDir::new().unwrap();
        let result = ArchiveSource::open(config_for(&tmp.path().join("nope"), ArchiveSelector::default()));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_year_fails_at_setup() {
        let tmp = TempDir::new().unwrap();
        let result = ArchiveSource::open(config_for(
            tmp.path(),
            ArchiveSelector::parse("1999", None, None).unwrap(),
        ));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let mut source = ArchiveSource::from_files(
            vec![tmp.path().join("2024-01-01-0.json.gz")],
            ArchiveConfig::default(),
        );
        assert!(matches!(source.next(), Some(Err(Error::Io(_)))));
    }

    #[test]
    fn test_selector_validation() {
        assert!(ArchiveSelector::parse("2024", Some(13), None).is_err());
        assert!(ArchiveSelector::parse("2024", None, Some(3)).is_err());
        assert!(ArchiveSelector::parse("20x4", None, None).is_err());
        assert_eq!(ArchiveSelector::parse("*", None, None).unwrap().year, None);
    }

    #[test]
    fn test_selector_labels() {
        assert_eq!(ArchiveSelector::parse("2024", None, None).unwrap().label(), "2024");
        assert_eq!(ArchiveSelector::parse("2024", Some(3), Some(1)).unwrap().label(), "2024-03-01");
        assert_eq!(ArchiveSelector::parse("*", Some(3), None).unwrap().label(), "all-03");
    }
}
