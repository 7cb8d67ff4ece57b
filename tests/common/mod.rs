//! Shared helpers for the integration tests: synthetic images and one-call
//! scan and reduce runs against a temporary directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use steamcarve::config::ScanConfig;
use steamcarve::evidence::{EvidenceSource, RawFileSource};
use steamcarve::pipeline::{self, PipelineStats, RunInfo};
use steamcarve::record::Record;
use steamcarve::sink::{self, SinkBackendKind};

pub const ONE_MIB: usize = 1024 * 1024;

pub const URL_AT_500: &[u8] = b"https://steamcommunity.com/id/testuser";
pub const CHAT_AT_200000: &[u8] = b"1700000000000 hello world";
pub const STEAMID_AT_900000: &[u8] = b"76561198000000000";

pub fn insert_bytes(target: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if end > target.len() {
        target.resize(end, 0u8);
    }
    target[offset..end].copy_from_slice(data);
}

pub fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// 1 MiB of zeros with a URL, a chat line and an identifier planted.
pub fn three_artifact_image() -> Vec<u8> {
    let mut image = vec![0u8; ONE_MIB];
    insert_bytes(&mut image, 500, URL_AT_500);
    insert_bytes(&mut image, 200_000, CHAT_AT_200000);
    insert_bytes(&mut image, 900_000, STEAMID_AT_900000);
    image
}

pub fn scan_config(chunk_size: u64, overlap: u64) -> ScanConfig {
    ScanConfig {
        chunk_size,
        overlap,
        ..ScanConfig::default()
    }
}

pub fn write_image(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("memory.raw");
    fs::write(&path, bytes).expect("write image");
    path
}

/// Scan `image_path` into `<dir>/run/records.<ext>` and return the stats
/// with the run directory.
pub fn scan_file(
    dir: &Path,
    image_path: &Path,
    cfg: &ScanConfig,
    workers: usize,
    backend: SinkBackendKind,
) -> (PipelineStats, PathBuf) {
    let run_output_dir = dir.join("run");
    let evidence = RawFileSource::open(image_path).expect("evidence");
    let evidence: Arc<dyn EvidenceSource> = Arc::new(evidence);
    let record_sink = sink::build_sink(backend, &run_output_dir).expect("sink");

    let stats = pipeline::run_pipeline_with_cancel(
        cfg,
        evidence,
        record_sink,
        workers,
        Arc::new(AtomicBool::new(false)),
        None,
        RunInfo {
            run_id: "test_run".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: "test".to_string(),
            evidence_path: image_path.display().to_string(),
        },
    )
    .expect("pipeline");
    (stats, run_output_dir)
}

pub fn read_jsonl_records(path: &Path) -> Vec<Record> {
    fs::read_to_string(path)
        .expect("read jsonl")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("record json"))
        .collect()
}
