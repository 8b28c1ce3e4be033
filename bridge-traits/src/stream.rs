//! Host stream handles.
//!
//! The decode core never opens files or sockets itself. Hosts hand it a
//! [`StreamHandle`] (a local file, an HTTP body, an in-memory buffer) and the
//! core reaches it only through [`StreamIoBridge`](crate::stream_io::StreamIoBridge).

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{
    error::{BridgeError, Result},
    platform::PlatformSend,
};

/// Origin for [`StreamHandle::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Start,
    Current,
    End,
}

/// Total size of a stream as reported by the host.
///
/// Radio and chunked HTTP streams have no known size. That is a normal
/// condition, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSize {
    Known(u64),
    Unknown,
}

impl StreamSize {
    /// Returns the byte length when known.
    pub fn known(self) -> Option<u64> {
        match self {
            StreamSize::Known(len) => Some(len),
            StreamSize::Unknown => None,
        }
    }
}

/// Byte stream supplied by the host.
///
/// Implementations must be movable to the decode thread. `read` returning
/// `Ok(0)` for a non-empty buffer means end of stream.
pub trait StreamHandle: PlatformSend {
    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reposition the stream.
    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()>;

    /// Current absolute byte position.
    fn tell(&mut self) -> Result<u64>;

    /// Total byte length, when the host knows it.
    fn size(&mut self) -> StreamSize;

    /// Whether the read position is at or past the end.
    fn eof(&mut self) -> bool;

    /// Whether `seek` is expected to work.
    fn is_seekable(&self) -> bool {
        true
    }

    /// Write bytes at the current position. Read-only hosts leave the default.
    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(BridgeError::NotAvailable("stream is read-only".to_string()))
    }

    /// Truncate (or extend) the stream to `len` bytes.
    fn truncate(&mut self, _len: u64) -> Result<()> {
        Err(BridgeError::NotAvailable("stream cannot be truncated".to_string()))
    }
}

fn to_seek_from(offset: i64, whence: SeekWhence) -> Result<SeekFrom> {
    match whence {
        SeekWhence::Start => u64::try_from(offset)
            .map(SeekFrom::Start)
            .map_err(|_| BridgeError::SeekFailed(format!("negative absolute offset {offset}"))),
        SeekWhence::Current => Ok(SeekFrom::Current(offset)),
        SeekWhence::End => Ok(SeekFrom::End(offset)),
    }
}

/// In-memory stream, used for buffered downloads and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    report_size: bool,
    seekable: bool,
}

impl MemoryStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: Cursor::new(data.into()),
            report_size: true,
            seekable: true,
        }
    }

    /// Hide the length from callers, the way a live radio stream would.
    pub fn with_unknown_size(mut self) -> Self {
        self.report_size = false;
        self
    }

    /// Make every seek fail.
    pub fn non_seekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn get_ref(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl StreamHandle for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(Read::read(&mut self.cursor, buf)?)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()> {
        if !self.seekable {
            return Err(BridgeError::NotAvailable("stream is not seekable".to_string()));
        }
        let target = to_seek_from(offset, whence)?;
        Seek::seek(&mut self.cursor, target)?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.cursor.position())
    }

    fn size(&mut self) -> StreamSize {
        if self.report_size {
            StreamSize::Known(self.cursor.get_ref().len() as u64)
        } else {
            StreamSize::Unknown
        }
    }

    fn eof(&mut self) -> bool {
        self.cursor.position() >= self.cursor.get_ref().len() as u64
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(Write::write(&mut self.cursor, buf)?)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| BridgeError::OperationFailed(format!("length {len} too large")))?;
        self.cursor.get_mut().resize(len, 0);
        if self.cursor.position() > len as u64 {
            self.cursor.set_position(len as u64);
        }
        Ok(())
    }
}

/// Local file stream for desktop hosts.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    writable: bool,
}

impl FileStream {
    /// Open a file for decoding.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            writable: false,
        })
    }

    /// Open a file for tag rewriting.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            writable: true,
        })
    }
}

impl StreamHandle for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()> {
        let target = to_seek_from(offset, whence)?;
        self.file.seek(target)?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    fn size(&mut self) -> StreamSize {
        match self.file.metadata() {
            Ok(meta) => StreamSize::Known(meta.len()),
            Err(_) => StreamSize::Unknown,
        }
    }

    fn eof(&mut self) -> bool {
        match (self.file.stream_position(), self.size()) {
            (Ok(pos), StreamSize::Known(len)) => pos >= len,
            _ => false,
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(BridgeError::NotAvailable("file opened read-only".to_string()));
        }
        Ok(self.file.write(buf)?)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(BridgeError::NotAvailable("file opened read-only".to_string()));
        }
        self.file.set_len(len)?;
        Ok(())
    }
}
