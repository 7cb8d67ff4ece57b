//! # Row Sinks
//!
//! Persist the ordered record stream as a table. The carver drives exactly one
//! sink from a single writer thread, so backends take `&mut self`.

pub mod csv;
pub mod jsonl;
pub mod parquet;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::record::{Record, RunSummary};

/// Column order shared by every tabular backend.
pub const RECORD_COLUMNS: [&str; 8] = [
    "kind", "offset", "preview", "steamid", "unix_ts", "message", "value", "encoding",
];

pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkBackendKind {
    Csv,
    Jsonl,
    Parquet,
}

impl SinkBackendKind {
    pub fn extension(self) -> &'static str {
        match self {
            SinkBackendKind::Csv => "csv",
            SinkBackendKind::Jsonl => "jsonl",
            SinkBackendKind::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("parquet error: {0}")]
    Parquet(String),
    #[error("other error: {0}")]
    Other(String),
}

pub trait RecordSink: Send {
    fn record(&mut self, record: &Record) -> Result<(), SinkError>;
    fn record_run_summary(&mut self, summary: &RunSummary) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Keeps records in memory; `handle()` gives callers a view after the scan.
#[derive(Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
    summary: Arc<Mutex<Option<RunSummary>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<Record>>> {
        Arc::clone(&self.records)
    }

    pub fn summary_handle(&self) -> Arc<Mutex<Option<RunSummary>>> {
        Arc::clone(&self.summary)
    }
}

impl RecordSink for MemorySink {
    fn record(&mut self, record: &Record) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Other("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn record_run_summary(&mut self, summary: &RunSummary) -> Result<(), SinkError> {
        *self
            .summary
            .lock()
            .map_err(|_| SinkError::Other("memory sink lock poisoned".to_string()))? =
            Some(summary.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub fn records_path(run_output_dir: &Path, backend: SinkBackendKind) -> PathBuf {
    run_output_dir.join(format!("records.{}", backend.extension()))
}

pub fn build_sink(
    backend: SinkBackendKind,
    run_output_dir: &Path,
) -> Result<Box<dyn RecordSink>, SinkError> {
    std::fs::create_dir_all(run_output_dir)?;
    let path = records_path(run_output_dir, backend);
    match backend {
        SinkBackendKind::Csv => Ok(Box::new(csv::CsvSink::new(&path)?)),
        SinkBackendKind::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(&path)?)),
        SinkBackendKind::Parquet => Ok(Box::new(parquet::ParquetSink::new(&path)?)),
    }
}

/// The run summary is a single JSON document next to the record table,
/// whatever the table backend.
pub(crate) fn write_run_summary(table_path: &Path, summary: &RunSummary) -> Result<(), SinkError> {
    let dir = table_path.parent().unwrap_or_else(|| Path::new("."));
    let mut out = BufWriter::new(File::create(dir.join(RUN_SUMMARY_FILE))?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.flush()?;
    Ok(())
}
