//! # Pipeline Events
//!
//! Messages that flow from the scan workers to the single writer thread.

use crate::carve::WindowOutput;
use crate::chunk::ScanChunk;

/// Everything one window produced.
#[derive(Debug)]
pub struct WindowResult {
    pub chunk: ScanChunk,
    pub output: WindowOutput,
}

/// Totals known only to the reader loop, handed over when scanning stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanTotals {
    pub bytes_scanned: u64,
    pub chunks_processed: u64,
    pub cancelled: bool,
}

#[derive(Debug)]
pub enum SinkEvent {
    /// A scanned window; may arrive out of window order.
    Window(WindowResult),
    /// No more windows will be sent; write the run summary and flush.
    Finish(ScanTotals),
}
