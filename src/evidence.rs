use std::fs::File;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("io error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("range {offset}+{len} is outside the image ({image_len} bytes)")]
    OutOfRange { offset: u64, len: u64, image_len: u64 },
    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead { offset: u64, wanted: usize, got: usize },
}

impl EvidenceError {
    pub fn offset(&self) -> u64 {
        match self {
            EvidenceError::Io { offset, .. }
            | EvidenceError::OutOfRange { offset, .. }
            | EvidenceError::ShortRead { offset, .. } => *offset,
        }
    }
}

/// Random-access, read-only view of a memory image. Reads are range scoped,
/// so one source can be shared across scan threads.
pub trait EvidenceSource: Send + Sync {
    fn len(&self) -> u64;
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, EvidenceError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fill `buf` from `offset`, failing on any range the source cannot supply.
pub fn read_exact_at(
    source: &dyn EvidenceSource,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), EvidenceError> {
    let image_len = source.len();
    let end = offset.saturating_add(buf.len() as u64);
    if end > image_len {
        return Err(EvidenceError::OutOfRange {
            offset,
            len: buf.len() as u64,
            image_len,
        });
    }
    let mut read = 0usize;
    while read < buf.len() {
        let n = source.read_at(offset + read as u64, &mut buf[read..])?;
        if n == 0 {
            return Err(EvidenceError::ShortRead {
                offset,
                wanted: buf.len(),
                got: read,
            });
        }
        read += n;
    }
    Ok(())
}

pub struct RawFileSource {
    file: File,
    len: u64,
    #[cfg(not(unix))]
    lock: std::sync::Mutex<()>,
}

impl RawFileSource {
    pub fn open(path: &Path) -> Result<Self, EvidenceError> {
        let io = |source: std::io::Error| EvidenceError::Io { offset: 0, source };
        let file = File::open(path).map_err(io)?;
        let len = file.metadata().map_err(io)?.len();
        Ok(Self {
            file,
            len,
            #[cfg(not(unix))]
            lock: std::sync::Mutex::new(()),
        })
    }
}

impl EvidenceSource for RawFileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, EvidenceError> {
        let io = |source: std::io::Error| EvidenceError::Io { offset, source };
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset).map_err(io)
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let _guard = self
                .lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut f = &self.file;
            f.seek(SeekFrom::Start(offset)).map_err(io)?;
            f.read(buf).map_err(io)
        }
    }
}

/// An image held in memory, for embedding callers and synthetic buffers.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl EvidenceSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, EvidenceError> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start > self.data.len() {
            return Err(EvidenceError::OutOfRange {
                offset,
                len: buf.len() as u64,
                image_len: self.len(),
            });
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

pub fn open_source(path: &Path) -> Result<Box<dyn EvidenceSource>, EvidenceError> {
    Ok(Box::new(RawFileSource::open(path)?))
}
