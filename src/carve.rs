//! Per-window carving: string runs -> ownership filter -> classifier.

use crate::chunk::ScanChunk;
use crate::classify::classify_candidate;
use crate::config::ScanConfig;
use crate::record::Record;
use crate::strings::StringScanner;

/// Records carved from one window, in ascending offset order.
#[derive(Debug, Default)]
pub struct WindowOutput {
    pub records: Vec<Record>,
    /// Runs that survived the ownership filter.
    pub string_spans: u64,
}

/// Scan one window's read buffer. Runs that start outside the window's
/// nominal range are dropped; the neighbouring window reports them.
pub fn carve_window(
    chunk: &ScanChunk,
    data: &[u8],
    scanner: &dyn StringScanner,
    cfg: &ScanConfig,
) -> WindowOutput {
    let mut out = WindowOutput::default();
    for span in scanner.scan_chunk(chunk, data) {
        let global_start = span.global_start(chunk);
        if !chunk.owns(global_start) {
            continue;
        }
        out.string_spans += 1;
        let text = span.decode(data);
        if let Some(record) = classify_candidate(&text, global_start, span.encoding, cfg) {
            out.records.push(record);
        }
    }
    out
}
