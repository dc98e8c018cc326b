//! CSV sink with column-drift rotation.

use super::{OutputFile, RowSink, already_finished};
use crate::row::{Row, cell};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// CSV writer whose column set only grows.
///
/// The header of a file is the fixed columns followed by the extra columns
/// of the first row, in first-seen order. A later row with an unknown column
/// closes the file and continues in `<stem>-<n>.<ext>` with the extended
/// header. Columns a row lacks are written as empty cells.
pub struct CsvSink {
    base_path: PathBuf,
    columns: Vec<String>,
    writer: Option<csv::Writer<OutputFile>>,
    files: Vec<PathBuf>,
    rows_written: usize,
    finished: bool,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, fixed_columns: Vec<String>) -> Self {
        Self {
            base_path: path.into(),
            columns: fixed_columns,
            writer: None,
            files: Vec::new(),
            rows_written: 0,
            finished: false,
        }
    }

    /// Current header.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn new_columns(&self, row: &Row) -> Vec<String> {
        row.columns()
            .filter(|c| !self.columns.iter().any(|known| known == c))
            .map(String::from)
            .collect()
    }

    fn open_file(&mut self) -> Result<()> {
        let path = match self.files.len() {
            0 => self.base_path.clone(),
            n => rotated_path(&self.base_path, n),
        };
        debug!("Creating CSV file: {}", path.display());

        let mut writer = csv::Writer::from_writer(OutputFile::create(&path)?);
        writer.write_record(&self.columns)?;
        self.writer = Some(writer);
        self.files.push(path);
        Ok(())
    }

    fn close_file(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
            file.finish()?;
        }
        Ok(())
    }
}

impl RowSink for CsvSink {
    fn write_row(&mut self, row: &Row) -> Result<()> {
        if self.finished {
            return Err(already_finished(&self.base_path));
        }

        let added = self.new_columns(row);
        if self.writer.is_none() {
            self.columns.extend(added);
            self.open_file()?;
        } else if !added.is_empty() {
            warn!(
                "{}: new columns [{}], continuing in a new file",
                self.base_path.display(),
                added.join(", ")
            );
            self.close_file()?;
            self.columns.extend(added);
            self.open_file()?;
            if let Some(path) = self.files.last() {
                info!("Rotated CSV output to {}", path.display());
            }
        }

        if let Some(writer) = self.writer.as_mut() {
            let record = self
                .columns
                .iter()
                .map(|c| row.get(c).map(cell).unwrap_or_default());
            writer.write_record(record)?;
        }
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.close_file()
    }

    fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if let Err(e) = self.close_file() {
            warn!("Error closing {} on drop: {}", self.base_path.display(), e);
        }
    }
}

/// Path of the `n`-th rotated file: `type_2024.csv` → `type_2024-1.csv`.
///
/// A trailing `.gz` stays at the end: `a.csv.gz` → `a-1.csv.gz`.
pub fn rotated_path(path: &Path, n: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (name, gz) = match name.strip_suffix(".gz") {
        Some(inner) => (inner, ".gz"),
        None => (name.as_str(), ""),
    };
    let rotated = match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}{gz}"),
        None => format!("{name}-{n}{gz}"),
    };
    path.with_file_name(rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn row(pairs: &[(&str, i64)]) -> Row {
        let mut row = Row::new();
        for (column, value) in pairs {
            row.set(*column, *value);
        }
        row
    }

    #[test]
    fn test_rotated_path() {
        assert_eq!(rotated_path(Path::new("out/type_2024_1d.csv"), 1), Path::new("out/type_2024_1d-1.csv"));
        assert_eq!(rotated_path(Path::new("out/a.csv.gz"), 2), Path::new("out/a-2.csv.gz"));
        assert_eq!(rotated_path(Path::new("plain"), 3), Path::new("plain-3"));
    }

    #[test]
    fn test_schema_growth_rotates_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::new(&path, Vec::new());

        sink.write_row(&row(&[("a", 1), ("b", 2)])).unwrap();
        sink.write_row(&row(&[("a", 1), ("b", 2), ("c", 3)])).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.files(), [path.clone(), tmp.path().join("out-1.csv")]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        assert_eq!(fs::read_to_string(tmp.path().join("out-1.csv")).unwrap(), "a,b,c\n1,2,3\n");
        assert_eq!(sink.rows_written(), 2);
    }

    #[test]
    fn test_fixed_columns_lead_and_missing_cells_are_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let fixed = vec!["date".to_string(), "all".to_string(), "x".to_string()];
        let mut sink = CsvSink::new(&path, fixed);

        sink.write_row(&Row::new().with("y", 5).with("date", "d1").with("all", 5)).unwrap();
        sink.write_row(&Row::new().with("date", "d2").with("all", 0)).unwrap();
        sink.finish().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "date,all,x,y\nd1,5,,5\nd2,0,,\n"
        );
        assert_eq!(sink.files().len(), 1);
    }

    #[test]
    fn test_known_columns_in_any_order_do_not_rotate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::new(&path, Vec::new());

        sink.write_row(&row(&[("a", 1), ("b", 2)])).unwrap();
        sink.write_row(&row(&[("b", 3), ("a", 4)])).unwrap();
        sink.write_row(&row(&[("a", 5)])).unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n4,3\n5,\n");
    }

    #[test]
    fn test_repeated_growth_numbers_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::new(&path, Vec::new());

        sink.write_row(&row(&[("a", 1)])).unwrap();
        sink.write_row(&row(&[("b", 2)])).unwrap();
        sink.write_row(&row(&[("c", 3)])).unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("out-1.csv")).unwrap(), "a,b\n,2\n");
        assert_eq!(fs::read_to_string(tmp.path().join("out-2.csv")).unwrap(), "a,b,c\n,,3\n");
    }

    #[test]
    fn test_no_rows_no_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::new(&path, vec!["date".to_string()]);
        sink.finish().unwrap();
        assert!(!path.exists());
        assert!(sink.files().is_empty());
    }

    #[test]
    fn test_gzip_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv.gz");
        let mut sink = CsvSink::new(&path, Vec::new());
        sink.write_row(&row(&[("a", 1)])).unwrap();
        sink.finish().unwrap();

        let mut text = String::new();
        GzDecoder::new(fs::File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "a\n1\n");
    }

    #[test]
    fn test_write_after_finish_fails() {
        let tmp = TempDir::new().unwrap();
        let mut sink = CsvSink::new(tmp.path().join("out.csv"), Vec::new());
        sink.write_row(&row(&[("a", 1)])).unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.write_row(&row(&[("a", 2)])).is_err());
    }

    #[test]
    fn test_drop_closes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        {
            let mut sink = CsvSink::new(&path, Vec::new());
            sink.write_row(&row(&[("a", 1)])).unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n");
    }
}
