use crate::chunk::ScanChunk;
use crate::record::Encoding;
use crate::strings::{StringScanner, StringSpan};

pub struct CpuStringScanner {
    min_len: usize,
    scan_utf16: bool,
}

impl CpuStringScanner {
    pub fn new(min_len: usize, scan_utf16: bool) -> Self {
        Self {
            min_len: min_len.max(1),
            scan_utf16,
        }
    }
}

impl StringScanner for CpuStringScanner {
    fn scan_chunk(&self, chunk: &ScanChunk, data: &[u8]) -> Vec<StringSpan> {
        let mut spans = scan_ascii_runs(data, chunk, self.min_len);
        if self.scan_utf16 {
            spans.extend(scan_utf16le_runs(data, chunk, self.min_len));
            spans.sort_by_key(|span| (span.local_start, span.encoding == Encoding::Utf16le));
        }
        spans
    }
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E)
}

fn scan_ascii_runs(data: &[u8], chunk: &ScanChunk, min_len: usize) -> Vec<StringSpan> {
    let mut spans = Vec::new();
    let mut i = 0usize;

    while i < data.len() {
        if !is_printable(data[i]) {
            i += 1;
            continue;
        }

        let start = i;
        while i < data.len() && is_printable(data[i]) {
            i += 1;
        }

        let len = i - start;
        if len >= min_len {
            spans.push(StringSpan {
                chunk_id: chunk.id,
                local_start: start as u64,
                length: len as u32,
                encoding: Encoding::Ascii,
            });
        }
    }

    spans
}

/// Runs of `(printable, 0x00)` code units at both byte alignments. A trailing
/// odd byte can never complete a unit and is ignored.
fn scan_utf16le_runs(data: &[u8], chunk: &ScanChunk, min_len: usize) -> Vec<StringSpan> {
    let mut spans = Vec::new();
    let unit_ok = |j: usize| is_printable(data[j]) && data[j + 1] == 0;

    for alignment in 0..2usize {
        let mut i = alignment;
        while i + 1 < data.len() {
            if !unit_ok(i) {
                i += 2;
                continue;
            }

            let run_start = i;
            let mut units = 0usize;
            while i + 1 < data.len() && unit_ok(i) {
                units += 1;
                i += 2;
            }

            if units >= min_len {
                spans.push(StringSpan {
                    chunk_id: chunk.id,
                    local_start: run_start as u64,
                    length: (units * 2) as u32,
                    encoding: Encoding::Utf16le,
                });
            }
        }
    }

    spans
}
