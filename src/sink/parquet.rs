use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::{StringBuilder, UInt64Builder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::record::{Record, RunSummary};
use crate::sink::{RecordSink, SinkError, write_run_summary};

const ROW_GROUP_SIZE: usize = 64 * 1024;

pub struct ParquetSink {
    path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    buffer: Vec<Record>,
    finished: bool,
}

fn record_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("kind", DataType::Utf8, false),
        Field::new("offset", DataType::UInt64, false),
        Field::new("preview", DataType::Utf8, false),
        Field::new("steamid", DataType::UInt64, true),
        Field::new("unix_ts", DataType::UInt64, true),
        Field::new("message", DataType::Utf8, true),
        Field::new("value", DataType::Utf8, true),
        Field::new("encoding", DataType::Utf8, false),
    ]))
}

impl ParquetSink {
    pub fn new(path: &Path) -> Result<Self, SinkError> {
        let schema = record_schema();
        let props = WriterProperties::builder()
            .set_max_row_group_size(ROW_GROUP_SIZE)
            .build();
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .map_err(|err| SinkError::Parquet(format!("writer error: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            buffer: Vec::new(),
            finished: false,
        })
    }

    fn flush_buffer(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = build_batch(&self.buffer, &self.schema)?;
        self.buffer.clear();
        self.writer
            .write(&batch)
            .map_err(|err| SinkError::Parquet(format!("write error: {err}")))
    }
}

impl RecordSink for ParquetSink {
    fn record(&mut self, record: &Record) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Other("parquet sink already finished".to_string()));
        }
        self.buffer.push(record.clone());
        if self.buffer.len() >= ROW_GROUP_SIZE {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn record_run_summary(&mut self, summary: &RunSummary) -> Result<(), SinkError> {
        write_run_summary(&self.path, summary)
    }

    /// Writes the footer; a parquet file cannot be appended to afterwards.
    fn flush(&mut self) -> Result<(), SinkError> {
        if self.finished {
            return Ok(());
        }
        self.flush_buffer()?;
        self.writer
            .finish()
            .map_err(|err| SinkError::Parquet(format!("finish error: {err}")))?;
        self.finished = true;
        Ok(())
    }
}

fn build_batch(rows: &[Record], schema: &SchemaRef) -> Result<RecordBatch, SinkError> {
    let mut kind = StringBuilder::new();
    let mut offset = UInt64Builder::new();
    let mut preview = StringBuilder::new();
    let mut steamid = UInt64Builder::new();
    let mut unix_ts = UInt64Builder::new();
    let mut message = StringBuilder::new();
    let mut value = StringBuilder::new();
    let mut encoding = StringBuilder::new();

    for row in rows {
        kind.append_value(row.kind.as_str());
        offset.append_value(row.offset);
        preview.append_value(&row.preview);
        steamid.append_option(row.steamid);
        unix_ts.append_option(row.unix_ts);
        message.append_option(row.message.as_deref());
        value.append_option(row.value.as_deref());
        encoding.append_value(row.encoding.as_str());
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(kind.finish()),
        Arc::new(offset.finish()),
        Arc::new(preview.finish()),
        Arc::new(steamid.finish()),
        Arc::new(unix_ts.finish()),
        Arc::new(message.finish()),
        Arc::new(value.finish()),
        Arc::new(encoding.finish()),
    ];

    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|err| SinkError::Parquet(format!("batch error: {err}")))
}
