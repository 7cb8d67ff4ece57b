//! Streaming readers and writers for record tables.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use arrow_array::{Array, Int64Array, RecordBatch, StringArray, UInt64Array};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::record::{Encoding, Record, RecordKind};

use super::ReduceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Jsonl,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, ReduceError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("jsonl") | Some("ndjson") => Ok(TableFormat::Jsonl),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(ReduceError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Jsonl => "jsonl",
            TableFormat::Parquet => "parquet",
        }
    }

    /// Format of the clean table written for an input of this format.
    /// Parquet inputs are cleaned into CSV.
    pub fn clean_format(self) -> TableFormat {
        match self {
            TableFormat::Parquet => TableFormat::Csv,
            other => other,
        }
    }
}

/// Parse an offset cell: decimal, or hex with a `0x` prefix.
pub fn parse_offset(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    match cell
        .strip_prefix("0x")
        .or_else(|| cell.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => cell.parse().ok(),
    }
}

/// Empty, zero and unparsable identifier or timestamp cells mean "absent".
pub fn parse_optional_u64(cell: &str) -> Option<u64> {
    cell.trim().parse::<u64>().ok().filter(|v| *v != 0)
}

fn parse_encoding(cell: &str) -> Encoding {
    if cell.trim().eq_ignore_ascii_case("utf16le") {
        Encoding::Utf16le
    } else {
        Encoding::Ascii
    }
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

/// Assemble a record from loosely typed cells. Rows whose kind or offset
/// cannot be read yield `None`.
fn build_record(
    kind: &str,
    offset: &str,
    preview: &str,
    steamid: &str,
    unix_ts: &str,
    message: &str,
    value: &str,
    encoding: &str,
) -> Option<Record> {
    let kind: RecordKind = kind.parse().ok()?;
    let offset = parse_offset(offset)?;
    Some(Record {
        kind,
        offset,
        preview: preview.to_string(),
        steamid: parse_optional_u64(steamid),
        unix_ts: parse_optional_u64(unix_ts),
        message: non_empty(message),
        value: non_empty(value),
        encoding: parse_encoding(encoding),
    })
}

/// Rows of a record table, one at a time. Rows that do not describe a record
/// are counted in `skipped` and not yielded.
pub struct TableReader {
    inner: ReaderInner,
    pub skipped: u64,
}

enum ReaderInner {
    Csv {
        records: csv::StringRecordsIntoIter<BufReader<File>>,
        columns: HashMap<String, usize>,
    },
    Jsonl {
        lines: Lines<BufReader<File>>,
        line_no: u64,
    },
    Parquet {
        batches: ParquetRecordBatchReader,
        pending: std::vec::IntoIter<Option<Record>>,
    },
}

impl TableReader {
    pub fn open(path: &Path, format: TableFormat) -> Result<Self, ReduceError> {
        let file = File::open(path).map_err(|source| ReduceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let inner = match format {
            TableFormat::Csv => {
                let mut csv_reader = csv::ReaderBuilder::new()
                    .flexible(true)
                    .from_reader(BufReader::new(file));
                let columns = csv_reader
                    .headers()?
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
                    .collect();
                ReaderInner::Csv {
                    records: csv_reader.into_records(),
                    columns,
                }
            }
            TableFormat::Jsonl => ReaderInner::Jsonl {
                lines: BufReader::new(file).lines(),
                line_no: 0,
            },
            TableFormat::Parquet => {
                let batches = ParquetRecordBatchReaderBuilder::try_new(file)
                    .and_then(|builder| builder.with_batch_size(PARQUET_BATCH_ROWS).build())
                    .map_err(|err| ReduceError::Parquet(format!("{}: {err}", path.display())))?;
                ReaderInner::Parquet {
                    batches,
                    pending: Vec::new().into_iter(),
                }
            }
        };
        Ok(Self { inner, skipped: 0 })
    }
}

impl Iterator for TableReader {
    type Item = Result<Record, ReduceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let parsed = match &mut self.inner {
                ReaderInner::Csv { records, columns } => {
                    let row = match records.next()? {
                        Ok(row) => row,
                        Err(err) => return Some(Err(err.into())),
                    };
                    let cell = |name: &str| {
                        columns
                            .get(name)
                            .and_then(|idx| row.get(*idx))
                            .unwrap_or("")
                    };
                    build_record(
                        cell("kind"),
                        cell("offset"),
                        cell("preview"),
                        cell("steamid"),
                        cell("unix_ts"),
                        cell("message"),
                        cell("value"),
                        cell("encoding"),
                    )
                }
                ReaderInner::Jsonl { lines, line_no } => {
                    let line = match lines.next()? {
                        Ok(line) => line,
                        Err(err) => return Some(Err(ReduceError::Read(err))),
                    };
                    *line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let object: Value = match serde_json::from_str(&line) {
                        Ok(value) => value,
                        Err(source) => {
                            return Some(Err(ReduceError::Json {
                                line: *line_no,
                                source,
                            }));
                        }
                    };
                    let cell = |name: &str| json_cell(&object, name);
                    build_record(
                        &cell("kind"),
                        &cell("offset"),
                        &cell("preview"),
                        &cell("steamid"),
                        &cell("unix_ts"),
                        &cell("message"),
                        &cell("value"),
                        &cell("encoding"),
                    )
                }
                ReaderInner::Parquet { batches, pending } => match pending.next() {
                    Some(parsed) => parsed,
                    None => {
                        match batches.next()? {
                            Ok(batch) => *pending = batch_records(&batch).into_iter(),
                            Err(err) => {
                                return Some(Err(ReduceError::Parquet(format!(
                                    "batch read error: {err}"
                                ))));
                            }
                        }
                        continue;
                    }
                },
            };

            match parsed {
                Some(record) => return Some(Ok(record)),
                None => {
                    self.skipped += 1;
                    debug!("skipping row without a known kind or offset");
                }
            }
        }
    }
}

/// Render a JSON field as the text a CSV cell would hold.
fn json_cell(object: &Value, name: &str) -> String {
    match object.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

const PARQUET_BATCH_ROWS: usize = 8 * 1024;

/// Render a parquet cell as the text a CSV cell would hold. Missing columns
/// and nulls read as empty.
fn parquet_cell(batch: &RecordBatch, name: &str, row: usize) -> String {
    let Some(column) = batch.column_by_name(name) else {
        return String::new();
    };
    if column.is_null(row) {
        return String::new();
    }
    let any = column.as_any();
    if let Some(strings) = any.downcast_ref::<StringArray>() {
        strings.value(row).to_string()
    } else if let Some(numbers) = any.downcast_ref::<UInt64Array>() {
        numbers.value(row).to_string()
    } else if let Some(numbers) = any.downcast_ref::<Int64Array>() {
        numbers.value(row).to_string()
    } else {
        String::new()
    }
}

fn batch_records(batch: &RecordBatch) -> Vec<Option<Record>> {
    (0..batch.num_rows())
        .map(|row| {
            let cell = |name: &str| parquet_cell(batch, name, row);
            build_record(
                &cell("kind"),
                &cell("offset"),
                &cell("preview"),
                &cell("steamid"),
                &cell("unix_ts"),
                &cell("message"),
                &cell("value"),
                &cell("encoding"),
            )
        })
        .collect()
}

pub const CLEAN_COLUMNS: [&str; 13] = [
    "kind",
    "timestamp",
    "unix_ts",
    "offset",
    "offset_hex",
    "steamid",
    "message",
    "value",
    "preview",
    "host",
    "domain",
    "url_path",
    "encoding",
];

/// A kept row plus its derived columns. Field order matches `CLEAN_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanRow {
    pub kind: RecordKind,
    pub timestamp: Option<String>,
    pub unix_ts: Option<u64>,
    pub offset: u64,
    pub offset_hex: String,
    pub steamid: Option<u64>,
    pub message: Option<String>,
    pub value: Option<String>,
    pub preview: String,
    pub host: Option<String>,
    pub domain: Option<String>,
    pub url_path: Option<String>,
    pub encoding: Encoding,
}

pub enum CleanWriter {
    Csv(csv::Writer<BufWriter<File>>),
    Jsonl(BufWriter<File>),
}

impl CleanWriter {
    /// Clean tables are never parquet; a parquet `format` writes CSV.
    pub fn create(path: &Path, format: TableFormat) -> Result<Self, ReduceError> {
        let file = File::create(path).map_err(|source| ReduceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let out = BufWriter::new(file);
        match format {
            TableFormat::Csv | TableFormat::Parquet => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(out);
                writer.write_record(CLEAN_COLUMNS)?;
                Ok(CleanWriter::Csv(writer))
            }
            TableFormat::Jsonl => Ok(CleanWriter::Jsonl(out)),
        }
    }

    pub fn write(&mut self, row: &CleanRow) -> Result<(), ReduceError> {
        match self {
            CleanWriter::Csv(writer) => writer.serialize(row)?,
            CleanWriter::Jsonl(out) => {
                serde_json::to_writer(&mut *out, row)?;
                out.write_all(b"\n").map_err(ReduceError::Write)?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<(), ReduceError> {
        match self {
            CleanWriter::Csv(mut writer) => writer.flush().map_err(ReduceError::Write),
            CleanWriter::Jsonl(mut out) => out.flush().map_err(ReduceError::Write),
        }
    }
}
