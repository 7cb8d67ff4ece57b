/// One scan window. `[start, start + valid_length)` is the nominal range the
/// window owns; `[read_start, read_start + read_length)` is what gets read,
/// padded by up to `overlap` bytes on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanChunk {
    pub id: u64,
    pub start: u64,
    pub valid_length: u64,
    pub read_start: u64,
    pub read_length: u64,
}

impl ScanChunk {
    pub fn end(&self) -> u64 {
        self.start + self.valid_length
    }

    /// Whether a run beginning at `global_offset` belongs to this window.
    pub fn owns(&self, global_offset: u64) -> bool {
        global_offset >= self.start && global_offset < self.end()
    }
}

pub fn chunk_count(total_len: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    total_len.div_ceil(chunk_size)
}

pub struct ChunkIter {
    total_len: u64,
    chunk_size: u64,
    overlap: u64,
    next_start: u64,
    next_id: u64,
}

impl ChunkIter {
    pub fn new(total_len: u64, chunk_size: u64, overlap: u64) -> Self {
        Self {
            total_len,
            chunk_size,
            overlap,
            next_start: 0,
            next_id: 0,
        }
    }
}

impl Iterator for ChunkIter {
    type Item = ScanChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.chunk_size == 0 || self.next_start >= self.total_len {
            return None;
        }
        let start = self.next_start;
        let valid_length = (self.total_len - start).min(self.chunk_size);
        let read_start = start.saturating_sub(self.overlap);
        let read_end = start
            .saturating_add(valid_length)
            .saturating_add(self.overlap)
            .min(self.total_len);

        let chunk = ScanChunk {
            id: self.next_id,
            start,
            valid_length,
            read_start,
            read_length: read_end - read_start,
        };
        self.next_start = start.saturating_add(self.chunk_size);
        self.next_id += 1;
        Some(chunk)
    }
}

pub fn build_chunks(total_len: u64, chunk_size: u64, overlap: u64) -> Vec<ScanChunk> {
    ChunkIter::new(total_len, chunk_size, overlap).collect()
}
