//! Bulk-index preparation.
//!
//! Turns an exported CSV or NDJSON file into search-index documents:
//!
//! ```text
//! delete_2024_1d.csv ─▶ records ─▶ transform_document ─▶ BulkDocument ─▶ BulkTarget
//!   (type = "delete")              (date → timestamp,      (index, id)     (batches)
//!                                   hour, weekday)
//! ```
//!
//! The record type is the file name prefix before the first `_`, and must
//! have a registered [`BulkIndex`]. Document IDs are content hashes, so
//! feeding the same file twice produces the same documents.

use crate::sink::{OutputFormat, is_gzip};
use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use flate2::read::MultiGzDecoder;
use ghstats_core::ISO_SECONDS;
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// A JSON object: one exported record or one index document.
pub type Record = Map<String, Value>;

/// Field types of the timestamp fields added to every document.
const TIMESTAMP_FIELDS: &[(&str, &str)] = &[
    ("timestamp", "date"),
    ("timestamp_weekday", "keyword"),
    ("timestamp_hour", "integer"),
];

/// An index family for one record type.
#[derive(Debug, Clone, Copy)]
pub struct BulkIndex {
    pub record_type: &'static str,

    /// Index name with `*` standing for the year.
    pub pattern: &'static str,

    /// Field name to index type, beyond the timestamp fields.
    pub fields: &'static [(&'static str, &'static str)],
}

impl BulkIndex {
    /// Index name for a document year.
    pub fn index_name(&self, year: i32) -> String {
        self.pattern.replace('*', &year.to_string())
    }

    /// Index mapping, suitable for an index template.
    pub fn mapping(&self) -> Value {
        let properties: Map<String, Value> = TIMESTAMP_FIELDS
            .iter()
            .chain(self.fields)
            .map(|(field, kind)| (field.to_string(), json!({ "type": kind })))
            .collect();
        json!({ "properties": properties })
    }

    fn field_type(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, t)| *t)
    }
}

pub static BULK_INDEXES: &[BulkIndex] = &[
    BulkIndex {
        record_type: "push",
        pattern: "gharchive-push-*",
        fields: &[
            ("user", "keyword"),
            ("org", "keyword"),
            ("repo", "keyword"),
            ("ref", "keyword"),
            ("events", "integer"),
            ("commits", "integer"),
            ("distinct_commits", "integer"),
            ("message_length", "integer"),
            ("authors", "integer"),
        ],
    },
    BulkIndex {
        record_type: "create",
        pattern: "gharchive-create-*",
        fields: &[
            ("user", "keyword"),
            ("org", "keyword"),
            ("repo", "keyword"),
            ("ref", "keyword"),
            ("ref_type", "keyword"),
            ("master_branch", "keyword"),
            ("events", "integer"),
        ],
    },
    BulkIndex {
        record_type: "delete",
        pattern: "gharchive-delete-*",
        fields: &[
            ("user", "keyword"),
            ("org", "keyword"),
            ("repo", "keyword"),
            ("ref", "keyword"),
            ("ref_type", "keyword"),
            ("pusher_type", "keyword"),
            ("events", "integer"),
        ],
    },
    BulkIndex {
        record_type: "watch",
        pattern: "gharchive-watch-*",
        fields: &[
            ("user", "keyword"),
            ("repo", "keyword"),
            ("action", "keyword"),
            ("events", "integer"),
        ],
    },
];

/// Record type of an exported file: `delete_2024_1d.csv` → `delete`.
pub fn record_type(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('_').next())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Bulk(format!("cannot derive record type from {}", path.display())))
}

/// Index family for a record type.
pub fn bulk_index(record_type: &str) -> Result<&'static BulkIndex> {
    BULK_INDEXES
        .iter()
        .find(|i| i.record_type == record_type)
        .ok_or_else(|| Error::Bulk(format!("no index registered for type '{record_type}'")))
}

/// Configuration for a bulk export.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Documents per batch handed to the target.
    pub batch_size: usize,

    /// Progress reporting interval (records).
    pub progress_interval: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            progress_interval: 100_000,
        }
    }
}

/// A document ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkDocument {
    pub index: String,
    pub id: String,
    pub source: Record,
}

/// Receiver of document batches.
pub trait BulkTarget {
    fn send(&mut self, batch: &[BulkDocument]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes Elasticsearch `_bulk` request bodies: an action line followed by
/// the document source, for every document.
pub struct BulkFileTarget<W: Write> {
    writer: W,
    documents: usize,
}

impl<W: Write> BulkFileTarget<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            documents: 0,
        }
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BulkTarget for BulkFileTarget<W> {
    fn send(&mut self, batch: &[BulkDocument]) -> Result<()> {
        for doc in batch {
            let action = json!({ "index": { "_index": doc.index, "_id": doc.id } });
            serde_json::to_writer(&mut self.writer, &action)?;
            self.writer.write_all(b"\n")?;
            serde_json::to_writer(&mut self.writer, &doc.source)?;
            self.writer.write_all(b"\n")?;
        }
        self.documents += batch.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Results of a bulk export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub records: usize,
    pub documents: usize,
    pub batches: usize,
}

/// Read the records of an exported file (`.csv`, `.ndjson`, optionally `.gz`).
pub fn read_records(path: &Path) -> Result<Box<dyn Iterator<Item = Result<Record>>>> {
    let format = OutputFormat::from_path(path)?;
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };

    let records: Box<dyn Iterator<Item = Result<Record>>> = match format {
        OutputFormat::Csv => {
            let mut csv_reader = csv::Reader::from_reader(reader);
            let headers = csv_reader.headers()?.clone();
            Box::new(csv_reader.into_records().map(move |record| -> Result<Record> {
                let record = record?;
                Ok(headers
                    .iter()
                    .zip(record.iter())
                    .map(|(column, cell)| {
                        let value = if cell.is_empty() {
                            Value::Null
                        } else {
                            Value::from(cell)
                        };
                        (column.to_string(), value)
                    })
                    .collect())
            }))
        }
        OutputFormat::Ndjson => {
            let source = path.display().to_string();
            let lines = BufReader::new(reader).lines().enumerate();
            Box::new(lines.filter_map(move |(number, line)| match line {
                Err(e) => Some(Err(Error::Io(e))),
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => match serde_json::from_str::<Record>(&line) {
                    Ok(record) => Some(Ok(record)),
                    Err(e) => {
                        warn!("{}:{}: JSON parse error: {}", source, number + 1, e);
                        None
                    }
                },
            }))
        }
    };
    Ok(records)
}

fn parse_date(value: &Value) -> Result<DateTime<Utc>> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::Bulk(format!("'date' is not a string: {value}")))?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, ISO_SECONDS) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Bulk(format!("invalid date '{text}': {e}")))
}

/// Turn an exported record into an index document.
///
/// `date` is replaced by `timestamp`, `timestamp_hour` and
/// `timestamp_weekday` (`"0 Sunday"` .. `"6 Saturday"`). Cells of integer
/// fields are parsed as numbers.
pub fn transform_document(index: &BulkIndex, mut record: Record) -> Result<BulkDocument> {
    let date = record
        .remove("date")
        .ok_or_else(|| Error::Bulk("record has no 'date' field".to_string()))?;
    let timestamp = parse_date(&date)?;

    let mut source = Record::new();
    source.insert(
        "timestamp".to_string(),
        Value::from(timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
    );
    source.insert("timestamp_hour".to_string(), Value::from(timestamp.hour()));
    source.insert(
        "timestamp_weekday".to_string(),
        Value::from(timestamp.format("%w %A").to_string()),
    );

    for (field, value) in record {
        let value = match (&value, index.field_type(&field)) {
            (Value::String(s), Some("integer")) => s.parse::<i64>().map(Value::from).unwrap_or(value),
            _ => value,
        };
        source.insert(field, value);
    }

    let id = hex::encode(Sha256::digest(serde_json::to_vec(&source)?));

    Ok(BulkDocument {
        index: index.index_name(timestamp.year()),
        id,
        source,
    })
}

/// Feed every record of an exported file to a target in batches.
pub fn export_bulk(
    path: &Path,
    config: &BulkConfig,
    target: &mut dyn BulkTarget,
) -> Result<BulkStats> {
    let index = bulk_index(record_type(path)?)?;
    let batch_size = config.batch_size.max(1);
    info!("Exporting {} to {}", path.display(), index.pattern);

    let mut stats = BulkStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    for record in read_records(path)? {
        batch.push(transform_document(index, record?)?);
        stats.records += 1;

        if batch.len() >= batch_size {
            target.send(&batch)?;
            stats.documents += batch.len();
            stats.batches += 1;
            batch.clear();
        }

        if stats.records.is_multiple_of(config.progress_interval) {
            info!("Progress: {} records, {} batches sent", stats.records, stats.batches);
        }
    }

    if !batch.is_empty() {
        target.send(&batch)?;
        stats.documents += batch.len();
        stats.batches += 1;
    }
    target.finish()?;

    info!(
        "Exported {} records in {} batches from {}",
        stats.records,
        stats.batches,
        path.display()
    );
    Ok(stats)
}
