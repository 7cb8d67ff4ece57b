pub mod cpu;

use crate::chunk::ScanChunk;
use crate::config::ScanConfig;
use crate::record::Encoding;

/// A printable run found inside one window's read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSpan {
    pub chunk_id: u64,
    /// Offset of the first byte relative to the window's `read_start`.
    pub local_start: u64,
    /// Length in bytes (two per code unit for UTF-16LE).
    pub length: u32,
    pub encoding: Encoding,
}

impl StringSpan {
    pub fn global_start(&self, chunk: &ScanChunk) -> u64 {
        chunk.read_start + self.local_start
    }

    /// Decode the span's bytes from the window buffer it was found in.
    pub fn decode(&self, data: &[u8]) -> String {
        let start = self.local_start as usize;
        let end = start.saturating_add(self.length as usize).min(data.len());
        let bytes = &data[start.min(end)..end];
        match self.encoding {
            Encoding::Ascii => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

pub trait StringScanner: Send + Sync {
    /// Spans in ascending `local_start` order, ASCII before UTF-16LE on ties.
    fn scan_chunk(&self, chunk: &ScanChunk, data: &[u8]) -> Vec<StringSpan>;
}

pub fn build_string_scanner(cfg: &ScanConfig) -> Box<dyn StringScanner> {
    Box::new(cpu::CpuStringScanner::new(cfg.min_len, cfg.scan_utf16))
}
