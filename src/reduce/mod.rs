//! # Reducer
//!
//! Second pass over a raw record table: keeps the artifact rows, adds derived
//! columns, and summarizes domains, identifiers and chat lines. Input is read
//! one row at a time; only the findings accumulators stay in memory.

pub mod findings;
pub mod table;
pub mod url;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use thiserror::Error;
use tracing::info;

use crate::config::ReduceConfig;
use crate::record::{Record, RecordKind};

use findings::{Findings, FindingsBuilder, render_findings};
use table::{CleanRow, CleanWriter, TableFormat, TableReader};

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("unsupported table format: {0} (expected .csv, .jsonl or .parquet)")]
    UnsupportedFormat(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid json on line {line}: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("parquet error: {0}")]
    Parquet(String),
}

/// Paths written by one reduction and the row counts behind them.
#[derive(Debug, Clone)]
pub struct ReduceOutputs {
    pub clean_path: PathBuf,
    pub findings_path: PathBuf,
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub rows_kept: u64,
    pub findings: Findings,
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ` for a millisecond epoch value.
pub fn format_timestamp(unix_ms: u64) -> Option<String> {
    let millis = i64::try_from(unix_ms).ok()?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// Derive the clean row for `record`, or `None` when it is not kept.
pub fn clean_row(record: &Record, cfg: &ReduceConfig) -> Option<CleanRow> {
    if !matches!(
        record.kind,
        RecordKind::Url | RecordKind::Steamid | RecordKind::Chat
    ) {
        return None;
    }
    let has_payload = record.message.as_deref().is_some_and(|m| !m.is_empty())
        || record.value.as_deref().is_some_and(|v| !v.is_empty());
    if !has_payload && record.preview.chars().count() < cfg.min_preview_len {
        return None;
    }

    let parts = match record.kind {
        RecordKind::Url => record.value.as_deref().and_then(url::parse_url_parts),
        _ => None,
    };
    let (host, domain, url_path) = match parts {
        Some(parts) => (Some(parts.host), Some(parts.domain), parts.path),
        None => (None, None, None),
    };

    Some(CleanRow {
        kind: record.kind,
        timestamp: record.unix_ts.and_then(format_timestamp),
        unix_ts: record.unix_ts,
        offset: record.offset,
        offset_hex: format!("0x{:X}", record.offset),
        steamid: record.steamid,
        message: record.message.clone(),
        value: record.value.clone(),
        preview: record.preview.clone(),
        host,
        domain,
        url_path,
        encoding: record.encoding,
    })
}

/// `<stem>_clean.<ext>` and `<stem>_findings.csv` next to each other. `format`
/// is the clean table's format.
pub fn output_paths(input: &Path, output_dir: &Path, format: TableFormat) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("records");
    (
        output_dir.join(format!("{stem}_clean.{}", format.extension())),
        output_dir.join(format!("{stem}_findings.csv")),
    )
}

/// Reduce `input` into a clean table and a findings table. Outputs go to
/// `output_dir`, or next to the input when it is `None`.
pub fn reduce_file(
    input: &Path,
    output_dir: Option<&Path>,
    cfg: &ReduceConfig,
) -> Result<ReduceOutputs, ReduceError> {
    let format = TableFormat::from_path(input)?;
    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&output_dir).map_err(|source| ReduceError::Io {
        path: output_dir.clone(),
        source,
    })?;
    let (clean_path, findings_path) = output_paths(input, &output_dir, format.clean_format());

    let mut reader = TableReader::open(input, format)?;
    let mut writer = CleanWriter::create(&clean_path, format.clean_format())?;
    let mut builder = FindingsBuilder::new(cfg);
    let mut rows_read = 0u64;
    let mut rows_kept = 0u64;

    for record in reader.by_ref() {
        let record = record?;
        rows_read += 1;
        if let Some(row) = clean_row(&record, cfg) {
            writer.write(&row)?;
            builder.observe(&row);
            rows_kept += 1;
        }
    }
    writer.finish()?;

    let findings = builder.finish();
    let rendered = render_findings(&findings, cfg.chat_sample)?;
    fs::write(&findings_path, rendered).map_err(|source| ReduceError::Io {
        path: findings_path.clone(),
        source,
    })?;

    info!(
        "reduced {} rows_read={} rows_skipped={} rows_kept={} domains={} steamids={} chats={}",
        input.display(),
        rows_read,
        reader.skipped,
        rows_kept,
        findings.domains.len(),
        findings.steamids.len(),
        findings.chats.len()
    );

    Ok(ReduceOutputs {
        clean_path,
        findings_path,
        rows_read,
        rows_skipped: reader.skipped,
        rows_kept,
        findings,
    })
}
