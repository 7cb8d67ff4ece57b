use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::record::{Record, RunSummary};
use crate::sink::{RECORD_COLUMNS, RecordSink, SinkError, write_run_summary};

pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
}

impl CsvSink {
    pub fn new(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(RECORD_COLUMNS)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }
}

impl RecordSink for CsvSink {
    fn record(&mut self, record: &Record) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn record_run_summary(&mut self, summary: &RunSummary) -> Result<(), SinkError> {
        write_run_summary(&self.path, summary)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
