//! Backing storage for [`crate::reader::Reader`]: a buffer, a file handle, or
//! a non-seekable stream. Selection is automatic — constructors on `Reader`
//! pick the right source for the input they're handed — but all three share
//! this one trait so the bit-level logic in `reader.rs` never branches on
//! backing kind.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::errors::ReadError;

/// A source of bytes addressable by absolute offset.
pub trait ByteSource {
    /// Total length in bytes, if known without consuming the source.
    fn len(&mut self) -> Result<u64, ReadError>;

    /// Fills `buf` with the bytes at `[offset, offset + buf.len())`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ReadError>;
}

/// In-memory buffer: synchronous, trivially seekable, the common case.
pub struct BufferSource {
    data: Vec<u8>,
}

impl BufferSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for BufferSource {
    fn len(&mut self) -> Result<u64, ReadError> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len());
        let end = end.ok_or_else(|| ReadError::OutOfBounds {
            offset,
            needed: buf.len() as u32 * 8,
            available: (self.data.len() as u64).saturating_sub(offset) * 8,
        })?;

        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

/// Reads lazily from a file handle. Memory usage is O(1) plus the size of
/// each individual read; no whole-file buffering is performed.
pub struct FileSource {
    file: File,
    len: Option<u64>,
}

impl FileSource {
    pub fn new(file: File) -> Self {
        Self { file, len: None }
    }
}

impl ByteSource for FileSource {
    fn len(&mut self) -> Result<u64, ReadError> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let len = self
            .file
            .seek(SeekFrom::End(0))
            .map_err(|e| ReadError::Io {
                offset: 0,
                message: e.to_string(),
            })?;
        self.len = Some(len);
        Ok(len)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ReadError::Io {
                offset,
                message: e.to_string(),
            })?;
        self.file
            .read_exact(buf)
            .map_err(|e| ReadError::Io {
                offset,
                message: e.to_string(),
            })
    }
}

/// Wraps a non-seekable `Read` stream. The entire stream is drained into an
/// in-memory buffer the first time a read requires random access (anything
/// past the previous high-water mark), trading memory for seekability.
pub struct StreamSource {
    stream: Option<Box<dyn Read>>,
    buffered: Vec<u8>,
    drained: bool,
}

impl StreamSource {
    pub fn new(stream: Box<dyn Read>) -> Self {
        Self {
            stream: Some(stream),
            buffered: Vec::new(),
            drained: false,
        }
    }

    fn drain(&mut self) -> Result<(), ReadError> {
        if self.drained {
            return Ok(());
        }

        tracing::warn!(
            "binschema-codec: buffering an entire non-seekable stream into memory for random access"
        );

        if let Some(mut stream) = self.stream.take() {
            stream
                .read_to_end(&mut self.buffered)
                .map_err(|e| ReadError::Io {
                    offset: 0,
                    message: e.to_string(),
                })?;
        }
        self.drained = true;
        Ok(())
    }
}

impl ByteSource for StreamSource {
    fn len(&mut self) -> Result<u64, ReadError> {
        self.drain()?;
        Ok(self.buffered.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        self.drain()?;
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.buffered.len());
        let end = end.ok_or_else(|| ReadError::OutOfBounds {
            offset,
            needed: buf.len() as u32 * 8,
            available: (self.buffered.len() as u64).saturating_sub(offset) * 8,
        })?;

        buf.copy_from_slice(&self.buffered[start..end]);
        Ok(())
    }
}
