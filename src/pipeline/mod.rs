//! # Pipeline Module
//!
//! Orchestrates the chunked carve: windows are read in order on the calling
//! thread, carved by a pool of scan workers, and written by a single writer
//! thread that restores window order before anything reaches the sink.

pub mod events;
mod reorder;
pub mod workers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use thiserror::Error;
use tracing::{info, warn};

use crate::carve::carve_window;
use crate::chunk::{ChunkIter, ScanChunk, chunk_count};
use crate::config::{ConfigError, ScanConfig};
use crate::constants::{
    CHANNEL_CAPACITY_MULTIPLIER, MIB, MIN_CHANNEL_CAPACITY, WINDOWS_IN_FLIGHT_PER_WORKER,
};
use crate::evidence::{EvidenceError, EvidenceSource, read_exact_at};
use crate::record::Record;
use crate::sink::{MemorySink, RecordSink};
use crate::strings::{StringScanner, build_string_scanner};

use events::{ScanTotals, SinkEvent, WindowResult};
use workers::{RecordWriter, ScanJob, WriterOutcome};

#[derive(Debug, Error)]
pub enum CarveError {
    #[error("invalid scan configuration: {0}")]
    Config(#[from] ConfigError),
    /// Records of every window before `resume_offset` were written and
    /// flushed; a retry can start there.
    #[error("read failed at offset {offset} (records flushed up to {resume_offset}): {source}")]
    Read {
        offset: u64,
        resume_offset: u64,
        #[source]
        source: EvidenceError,
    },
    #[error("scan channel closed while sending window {0}")]
    ChannelClosed(u64),
}

/// Identity fields copied into the run summary.
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub run_id: String,
    pub tool_version: String,
    pub config_hash: String,
    pub evidence_path: String,
}

/// Pipeline statistics collected during a run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub bytes_scanned: u64,
    pub chunks_processed: u64,
    pub string_spans: u64,
    pub records_emitted: u64,
    pub sink_errors: u64,
    /// Start of the first window not written; equals the image length after
    /// a complete run.
    pub next_offset: u64,
    pub cancelled: bool,
}

/// Progress snapshot reported during a run.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub bytes_scanned: u64,
    pub total_bytes: u64,
    pub chunks_processed: u64,
    pub records_emitted: u64,
    pub sink_errors: u64,
    pub elapsed_seconds: f64,
    pub throughput_mib: f64,
    pub eta_seconds: Option<u64>,
    /// Completion percentage (0.0 - 100.0)
    pub completion_pct: f64,
}

/// Progress callback trait for long-running scans.
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

pub struct ProgressConfig {
    pub reporter: Arc<dyn ProgressReporter>,
    pub interval: Duration,
}

/// Reports progress through `tracing` at info level.
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let eta = snapshot
            .eta_seconds
            .map(|secs| format!("{secs}s"))
            .unwrap_or_else(|| "-".to_string());
        info!(
            "progress {:.1}% bytes={}/{} chunks={} records={} sink_errors={} rate={:.1}MiB/s eta={}",
            snapshot.completion_pct,
            snapshot.bytes_scanned,
            snapshot.total_bytes,
            snapshot.chunks_processed,
            snapshot.records_emitted,
            snapshot.sink_errors,
            snapshot.throughput_mib,
            eta
        );
    }
}

/// Carve the whole image into `sink`. `workers <= 1` runs on the calling
/// thread; the record stream is identical either way.
pub fn run_pipeline(
    cfg: &ScanConfig,
    evidence: Arc<dyn EvidenceSource>,
    sink: Box<dyn RecordSink>,
    workers: usize,
) -> Result<PipelineStats, CarveError> {
    PipelineRunner::new(cfg, evidence, workers, None, None, RunInfo::default()).run(sink)
}

/// Run the pipeline with an external cancellation flag (e.g., Ctrl+C).
pub fn run_pipeline_with_cancel(
    cfg: &ScanConfig,
    evidence: Arc<dyn EvidenceSource>,
    sink: Box<dyn RecordSink>,
    workers: usize,
    cancel_flag: Arc<AtomicBool>,
    progress: Option<ProgressConfig>,
    run_info: RunInfo,
) -> Result<PipelineStats, CarveError> {
    PipelineRunner::new(cfg, evidence, workers, Some(cancel_flag), progress, run_info).run(sink)
}

/// Sequential carve collected in memory, for embedding callers.
pub fn carve_records(
    cfg: &ScanConfig,
    evidence: Arc<dyn EvidenceSource>,
) -> Result<Vec<Record>, CarveError> {
    let sink = MemorySink::new();
    let handle = sink.handle();
    run_pipeline(cfg, evidence, Box::new(sink), 1)?;
    let records = match handle.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    Ok(records)
}

struct PipelineCounters {
    records_emitted: Arc<AtomicU64>,
    sink_errors: Arc<AtomicU64>,
}

impl PipelineCounters {
    fn new() -> Self {
        Self {
            records_emitted: Arc::new(AtomicU64::new(0)),
            sink_errors: Arc::new(AtomicU64::new(0)),
        }
    }
}

struct ScanOutcome {
    totals: ScanTotals,
    failure: Option<CarveError>,
    start_time: Instant,
}

struct PipelineRunner<'a> {
    cfg: &'a ScanConfig,
    evidence: Arc<dyn EvidenceSource>,
    workers: usize,
    cancel_flag: Option<Arc<AtomicBool>>,
    progress: Option<ProgressConfig>,
    run_info: RunInfo,
}

impl<'a> PipelineRunner<'a> {
    fn new(
        cfg: &'a ScanConfig,
        evidence: Arc<dyn EvidenceSource>,
        workers: usize,
        cancel_flag: Option<Arc<AtomicBool>>,
        progress: Option<ProgressConfig>,
        run_info: RunInfo,
    ) -> Self {
        Self {
            cfg,
            evidence,
            workers,
            cancel_flag,
            progress,
            run_info,
        }
    }

    fn run(self, sink: Box<dyn RecordSink>) -> Result<PipelineStats, CarveError> {
        self.cfg.validate()?;

        let total_bytes = self.evidence.len();
        info!(
            "chunk_count={} chunk_size={} overlap={} workers={}",
            chunk_count(total_bytes, self.cfg.chunk_size),
            self.cfg.chunk_size,
            self.cfg.overlap,
            self.workers.max(1)
        );

        let scanner: Arc<dyn StringScanner> = Arc::from(build_string_scanner(self.cfg));
        let counters = PipelineCounters::new();
        let writer = RecordWriter::new(
            sink,
            &self.run_info,
            counters.records_emitted.clone(),
            counters.sink_errors.clone(),
        );

        let (outcome, written) = if self.workers <= 1 {
            self.run_sequential(scanner, writer, &counters)
        } else {
            self.run_parallel(scanner, writer, &counters)
        };

        self.finalize(total_bytes, outcome, written, &counters)
    }

    fn run_sequential(
        &self,
        scanner: Arc<dyn StringScanner>,
        mut writer: RecordWriter,
        counters: &PipelineCounters,
    ) -> (ScanOutcome, WriterOutcome) {
        let mut dispatch = |chunk: ScanChunk, data: Vec<u8>| -> Result<(), CarveError> {
            let output = carve_window(&chunk, &data, scanner.as_ref(), self.cfg);
            writer.accept(WindowResult { chunk, output });
            Ok(())
        };
        let outcome = self.scan_loop(&mut dispatch, counters);
        let written = writer.finish(outcome.totals);
        (outcome, written)
    }

    fn run_parallel(
        &self,
        scanner: Arc<dyn StringScanner>,
        writer: RecordWriter,
        counters: &PipelineCounters,
    ) -> (ScanOutcome, WriterOutcome) {
        let channel_cap = self
            .workers
            .saturating_mul(CHANNEL_CAPACITY_MULTIPLIER)
            .max(MIN_CHANNEL_CAPACITY);
        let (scan_tx, scan_rx) = bounded::<ScanJob>(channel_cap);
        let (sink_tx, sink_rx) = bounded::<SinkEvent>(channel_cap * 2);

        // One permit per window between the reader and the sink. A slow
        // window stalls the reader instead of growing the reorder arena.
        let max_in_flight = self
            .workers
            .saturating_mul(WINDOWS_IN_FLIGHT_PER_WORKER)
            .max(MIN_CHANNEL_CAPACITY);
        let (permit_tx, permit_rx) = bounded::<()>(max_in_flight);
        for _ in 0..max_in_flight {
            let _ = permit_tx.try_send(());
        }
        let writer = writer.with_window_permits(permit_tx);

        let writer_handle = workers::spawn_writer_thread(writer, sink_rx);
        let scan_handles = workers::spawn_scan_workers(
            self.workers,
            scanner,
            Arc::new(self.cfg.clone()),
            scan_rx,
            sink_tx.clone(),
        );

        let mut dispatch = |chunk: ScanChunk, data: Vec<u8>| -> Result<(), CarveError> {
            let chunk_id = chunk.id;
            permit_rx
                .recv()
                .map_err(|_| CarveError::ChannelClosed(chunk_id))?;
            scan_tx
                .send(ScanJob {
                    chunk,
                    data: Arc::new(data),
                })
                .map_err(|_| CarveError::ChannelClosed(chunk_id))
        };
        let outcome = self.scan_loop(&mut dispatch, counters);

        drop(scan_tx);
        drop(permit_rx);
        for handle in scan_handles {
            if handle.join().is_err() {
                warn!("scan worker panicked");
            }
        }
        if let Err(err) = sink_tx.send(SinkEvent::Finish(outcome.totals)) {
            warn!("writer channel closed while sending run totals: {err}");
        }
        drop(sink_tx);

        let written = match writer_handle.join() {
            Ok(written) => written,
            Err(_) => {
                warn!("writer thread panicked");
                WriterOutcome::default()
            }
        };
        (outcome, written)
    }

    /// Read windows in order and hand each to `dispatch`, stopping at the
    /// first read failure or when cancellation is requested.
    fn scan_loop(
        &self,
        dispatch: &mut dyn FnMut(ScanChunk, Vec<u8>) -> Result<(), CarveError>,
        counters: &PipelineCounters,
    ) -> ScanOutcome {
        let total_bytes = self.evidence.len();
        let start_time = Instant::now();
        let mut last_progress = Instant::now();
        let mut totals = ScanTotals::default();
        let mut failure = None;

        for chunk in ChunkIter::new(total_bytes, self.cfg.chunk_size, self.cfg.overlap) {
            if let Some(flag) = &self.cancel_flag {
                if flag.load(Ordering::Relaxed) {
                    totals.cancelled = true;
                    break;
                }
            }

            let mut data = vec![0u8; chunk.read_length as usize];
            if let Err(source) = read_exact_at(self.evidence.as_ref(), chunk.read_start, &mut data)
            {
                failure = Some(CarveError::Read {
                    offset: source.offset(),
                    resume_offset: chunk.start,
                    source,
                });
                break;
            }

            let valid_length = chunk.valid_length;
            if let Err(err) = dispatch(chunk, data) {
                failure = Some(err);
                break;
            }
            totals.bytes_scanned += valid_length;
            totals.chunks_processed += 1;

            if let Some(progress) = &self.progress {
                if progress.interval.is_zero() || last_progress.elapsed() >= progress.interval {
                    let snapshot =
                        build_progress_snapshot(total_bytes, &start_time, &totals, counters);
                    progress.reporter.on_progress(&snapshot);
                    last_progress = Instant::now();
                }
            }
        }

        ScanOutcome {
            totals,
            failure,
            start_time,
        }
    }

    fn finalize(
        &self,
        total_bytes: u64,
        outcome: ScanOutcome,
        written: WriterOutcome,
        counters: &PipelineCounters,
    ) -> Result<PipelineStats, CarveError> {
        if let Some(progress) = &self.progress {
            let snapshot = build_progress_snapshot(
                total_bytes,
                &outcome.start_time,
                &outcome.totals,
                counters,
            );
            progress.reporter.on_progress(&snapshot);
        }

        if outcome.totals.cancelled {
            info!("shutdown requested; stopped after {} bytes", written.emitted_through);
        }

        let stats = PipelineStats {
            bytes_scanned: outcome.totals.bytes_scanned,
            chunks_processed: outcome.totals.chunks_processed,
            string_spans: written.string_spans,
            records_emitted: counters.records_emitted.load(Ordering::Relaxed),
            sink_errors: counters.sink_errors.load(Ordering::Relaxed),
            next_offset: written.emitted_through,
            cancelled: outcome.totals.cancelled,
        };

        info!(
            "run_summary bytes_scanned={} chunks_processed={} string_spans={} records={} urls={} steamids={} chats={} strings={} sink_errors={}",
            stats.bytes_scanned,
            stats.chunks_processed,
            stats.string_spans,
            stats.records_emitted,
            written.summary.urls,
            written.summary.steamids,
            written.summary.chats,
            written.summary.strings,
            stats.sink_errors
        );

        match outcome.failure {
            Some(err) => {
                warn!("carve stopped early: {err}");
                Err(err)
            }
            None => Ok(stats),
        }
    }
}

fn build_progress_snapshot(
    total_bytes: u64,
    start_time: &Instant,
    totals: &ScanTotals,
    counters: &PipelineCounters,
) -> ProgressSnapshot {
    let elapsed_seconds = start_time.elapsed().as_secs_f64();
    let scanned = totals.bytes_scanned;
    let bytes_per_sec = if elapsed_seconds > 0.0 {
        scanned as f64 / elapsed_seconds
    } else {
        0.0
    };
    let throughput_mib = bytes_per_sec / MIB as f64;
    let eta_seconds = if bytes_per_sec > 0.0 && scanned < total_bytes {
        Some(((total_bytes - scanned) as f64 / bytes_per_sec).round() as u64)
    } else {
        None
    };
    let completion_pct = if total_bytes > 0 {
        (scanned as f64 / total_bytes as f64) * 100.0
    } else {
        0.0
    };

    ProgressSnapshot {
        bytes_scanned: scanned,
        total_bytes,
        chunks_processed: totals.chunks_processed,
        records_emitted: counters.records_emitted.load(Ordering::Relaxed),
        sink_errors: counters.sink_errors.load(Ordering::Relaxed),
        elapsed_seconds,
        throughput_mib,
        eta_seconds,
        completion_pct,
    }
}
