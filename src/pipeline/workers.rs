//! # Pipeline Workers
//!
//! Scan worker threads and the single record writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::carve::carve_window;
use crate::chunk::ScanChunk;
use crate::config::ScanConfig;
use crate::record::RunSummary;
use crate::sink::RecordSink;
use crate::strings::StringScanner;

use super::RunInfo;
use super::events::{ScanTotals, SinkEvent, WindowResult};
use super::reorder::ReorderBuffer;

/// A window's read buffer, queued for scanning.
pub struct ScanJob {
    pub chunk: ScanChunk,
    pub data: Arc<Vec<u8>>,
}

/// What the writer saw once every window it received was written.
#[derive(Debug, Clone, Default)]
pub struct WriterOutcome {
    pub summary: RunSummary,
    /// Nominal end of the last window whose records reached the sink.
    pub emitted_through: u64,
    pub string_spans: u64,
}

/// Owns the sink. Windows may arrive in any order; records leave in window
/// order and, within a window, in the order the carver produced them.
pub struct RecordWriter {
    sink: Box<dyn RecordSink>,
    reorder: ReorderBuffer<WindowResult>,
    summary: RunSummary,
    string_spans: u64,
    emitted_through: u64,
    records_emitted: Arc<AtomicU64>,
    sink_errors: Arc<AtomicU64>,
    window_permits: Option<Sender<()>>,
}

impl RecordWriter {
    pub fn new(
        sink: Box<dyn RecordSink>,
        run_info: &RunInfo,
        records_emitted: Arc<AtomicU64>,
        sink_errors: Arc<AtomicU64>,
    ) -> Self {
        Self {
            sink,
            reorder: ReorderBuffer::new(),
            summary: RunSummary {
                run_id: run_info.run_id.clone(),
                tool_version: run_info.tool_version.clone(),
                config_hash: run_info.config_hash.clone(),
                evidence_path: run_info.evidence_path.clone(),
                ..RunSummary::default()
            },
            string_spans: 0,
            emitted_through: 0,
            records_emitted,
            sink_errors,
            window_permits: None,
        }
    }

    /// Hand back one permit on `permits` for every window written, so the
    /// reader can bound how many windows sit between it and the sink.
    pub fn with_window_permits(mut self, permits: Sender<()>) -> Self {
        self.window_permits = Some(permits);
        self
    }

    pub fn accept(&mut self, result: WindowResult) {
        for ready in self.reorder.insert(result.chunk.id, result) {
            self.emit(ready);
        }
    }

    fn emit(&mut self, result: WindowResult) {
        self.string_spans += result.output.string_spans;
        for record in &result.output.records {
            match self.sink.record(record) {
                Ok(()) => {
                    self.summary.count(record.kind);
                    self.records_emitted.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.sink_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "sink record error kind={} offset={}: {err}",
                        record.kind, record.offset
                    );
                }
            }
        }
        self.emitted_through = result.chunk.end();
        if let Some(permits) = &self.window_permits {
            // The reader may already be gone once the scan loop ends.
            let _ = permits.try_send(());
        }
    }

    /// Write the run summary and flush the sink.
    pub fn finish(mut self, totals: ScanTotals) -> WriterOutcome {
        let stranded = self.reorder.pending();
        if stranded > 0 {
            warn!("{stranded} window(s) never became writable and were dropped");
        }

        self.summary.bytes_scanned = totals.bytes_scanned;
        self.summary.chunks_processed = totals.chunks_processed;
        self.summary.string_spans = self.string_spans;
        self.summary.cancelled = totals.cancelled;

        if let Err(err) = self.sink.record_run_summary(&self.summary) {
            self.sink_errors.fetch_add(1, Ordering::Relaxed);
            warn!("run summary write error: {err}");
        }
        if let Err(err) = self.sink.flush() {
            self.sink_errors.fetch_add(1, Ordering::Relaxed);
            warn!("sink flush error: {err}");
        }

        WriterOutcome {
            summary: self.summary,
            emitted_through: self.emitted_through,
            string_spans: self.string_spans,
        }
    }
}

/// Spawn the thread that owns the sink for the whole run.
pub fn spawn_writer_thread(
    writer: RecordWriter,
    rx: Receiver<SinkEvent>,
) -> thread::JoinHandle<WriterOutcome> {
    thread::spawn(move || {
        let mut writer = writer;
        for event in rx {
            match event {
                SinkEvent::Window(result) => writer.accept(result),
                SinkEvent::Finish(totals) => return writer.finish(totals),
            }
        }
        warn!("writer channel closed before the scan finished");
        writer.finish(ScanTotals::default())
    })
}

/// Spawn `workers` threads that carve windows from `rx`.
pub fn spawn_scan_workers(
    workers: usize,
    scanner: Arc<dyn StringScanner>,
    cfg: Arc<ScanConfig>,
    rx: Receiver<ScanJob>,
    tx: Sender<SinkEvent>,
) -> Vec<thread::JoinHandle<()>> {
    let worker_count = workers.max(1);
    let mut handles = Vec::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        let scanner = Arc::clone(&scanner);
        let cfg = Arc::clone(&cfg);
        let rx = rx.clone();
        let tx = tx.clone();

        handles.push(thread::spawn(move || {
            for job in rx {
                let output = carve_window(&job.chunk, &job.data, scanner.as_ref(), &cfg);
                debug!(
                    "worker={worker_id} chunk={} records={} spans={}",
                    job.chunk.id,
                    output.records.len(),
                    output.string_spans
                );
                let event = SinkEvent::Window(WindowResult {
                    chunk: job.chunk,
                    output,
                });
                if tx.send(event).is_err() {
                    warn!("worker={worker_id} writer channel closed; stopping");
                    break;
                }
            }
        }));
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carve::WindowOutput;
    use crate::record::{Encoding, Record, RecordKind};
    use crate::sink::MemorySink;

    fn window(id: u64, offset: u64) -> WindowResult {
        WindowResult {
            chunk: ScanChunk {
                id,
                start: id * 10,
                valid_length: 10,
                read_start: id * 10,
                read_length: 10,
            },
            output: WindowOutput {
                records: vec![Record {
                    kind: RecordKind::String,
                    offset,
                    preview: format!("string at {offset}"),
                    steamid: None,
                    unix_ts: None,
                    message: None,
                    value: None,
                    encoding: Encoding::Ascii,
                }],
                string_spans: 1,
            },
        }
    }

    #[test]
    fn writer_emits_windows_in_id_order() {
        let sink = MemorySink::new();
        let records = sink.handle();
        let summary = sink.summary_handle();
        let emitted = Arc::new(AtomicU64::new(0));
        let mut writer = RecordWriter::new(
            Box::new(sink),
            &RunInfo::default(),
            emitted.clone(),
            Arc::new(AtomicU64::new(0)),
        );

        writer.accept(window(2, 25));
        writer.accept(window(0, 3));
        writer.accept(window(1, 14));
        let outcome = writer.finish(ScanTotals {
            bytes_scanned: 30,
            chunks_processed: 3,
            cancelled: false,
        });

        let offsets: Vec<u64> = records.lock().unwrap().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![3, 14, 25]);
        assert_eq!(emitted.load(Ordering::Relaxed), 3);
        assert_eq!(outcome.emitted_through, 30);
        assert_eq!(outcome.summary.strings, 3);
        assert_eq!(summary.lock().unwrap().as_ref().unwrap().string_spans, 3);
    }

    #[test]
    fn writer_releases_permits_only_for_written_windows() {
        let (permit_tx, permit_rx) = crossbeam_channel::bounded::<()>(4);
        let mut writer = RecordWriter::new(
            Box::new(MemorySink::new()),
            &RunInfo::default(),
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicU64::new(0)),
        )
        .with_window_permits(permit_tx);

        writer.accept(window(1, 14));
        writer.accept(window(2, 25));
        assert_eq!(permit_rx.len(), 0, "windows held behind window 0");

        writer.accept(window(0, 3));
        assert_eq!(permit_rx.len(), 3);

        writer.accept(window(4, 45));
        assert_eq!(permit_rx.len(), 3);
    }
}
