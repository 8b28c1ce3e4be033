//! # Stream I/O Bridge
//!
//! Adapts a host [`StreamHandle`] to the read/seek/tell/length/eof callback
//! contract a frame decoder expects.
//!
//! ## Overview
//!
//! The decode engine pulls bytes through the bridge and never touches the
//! host handle directly. Host failures are translated into explicit status
//! values:
//!
//! - `read` reports [`ReadStatus::Continue`], [`ReadStatus::EndOfStream`] or
//!   [`ReadStatus::Abort`]
//! - `seek` and `tell` return `Err` on failure, never a position
//! - `length` reports [`StreamSize::Unknown`] for streams without a size,
//!   which is not an error
//!
//! A read quota can be armed while probing so that sniffing a non-FLAC
//! stream never pulls more than a few kilobytes from the host.
//!
//! The bridge is cheap to clone. Clones share the handle and the quota.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    error::{BridgeError, Result},
    stream::{SeekWhence, StreamHandle, StreamSize},
};

/// Outcome of a bridged read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were placed at the start of the buffer (`n > 0`).
    Continue(usize),
    /// No more bytes will be produced.
    EndOfStream,
    /// The host reported an I/O failure.
    Abort,
}

struct BridgeState {
    handle: Box<dyn StreamHandle>,
    /// Remaining byte quota while probing; `None` means unlimited.
    read_limit: Option<u64>,
}

/// Shared adapter between a host stream and the decode engine.
#[derive(Clone)]
pub struct StreamIoBridge {
    state: Arc<Mutex<BridgeState>>,
    name: Arc<str>,
}

impl std::fmt::Debug for StreamIoBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIoBridge")
            .field("name", &self.name)
            .field("read_limit", &self.state.try_lock().map(|s| s.read_limit))
            .finish()
    }
}

impl StreamIoBridge {
    /// Wrap a host handle. `name` is only used in log output.
    pub fn new(handle: Box<dyn StreamHandle>, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            state: Arc::new(Mutex::new(BridgeState {
                handle,
                read_limit: None,
            })),
            name: name.into(),
        }
    }

    /// Convenience constructor for concrete handle types.
    pub fn from_handle<H: StreamHandle + 'static>(handle: H, name: impl Into<String>) -> Self {
        Self::new(Box::new(handle), name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Restrict the total number of bytes subsequent reads may return.
    pub fn set_read_limit(&self, limit: Option<u64>) {
        self.state.lock().read_limit = limit;
    }

    /// Lift any read quota.
    pub fn clear_read_limit(&self) {
        self.set_read_limit(None);
    }

    pub fn read_limit(&self) -> Option<u64> {
        self.state.lock().read_limit
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// A zero-length request reports end of stream without consulting the
    /// host.
    pub fn read(&self, buf: &mut [u8]) -> ReadStatus {
        if buf.is_empty() {
            return ReadStatus::EndOfStream;
        }

        let mut state = self.state.lock();
        let want = match state.read_limit {
            Some(0) => {
                trace!(stream = %self.name, "read quota exhausted");
                return ReadStatus::EndOfStream;
            }
            Some(limit) => buf.len().min(usize::try_from(limit).unwrap_or(usize::MAX)),
            None => buf.len(),
        };

        match state.handle.read(&mut buf[..want]) {
            Ok(0) => ReadStatus::EndOfStream,
            Ok(n) => {
                if let Some(limit) = state.read_limit.as_mut() {
                    *limit = limit.saturating_sub(n as u64);
                }
                ReadStatus::Continue(n)
            }
            Err(e) => {
                warn!(stream = %self.name, error = %e, "stream read failed");
                ReadStatus::Abort
            }
        }
    }

    /// Seek to an absolute byte offset.
    pub fn seek(&self, offset: u64) -> Result<()> {
        let offset = i64::try_from(offset)
            .map_err(|_| BridgeError::SeekFailed(format!("offset {offset} out of range")))?;
        self.seek_from(offset, SeekWhence::Start)
    }

    /// Seek relative to `whence`.
    pub fn seek_from(&self, offset: i64, whence: SeekWhence) -> Result<()> {
        let mut state = self.state.lock();
        state.handle.seek(offset, whence).map_err(|e| {
            debug!(stream = %self.name, offset, ?whence, error = %e, "stream seek failed");
            match e {
                BridgeError::SeekFailed(msg) => BridgeError::SeekFailed(msg),
                other => BridgeError::SeekFailed(other.to_string()),
            }
        })
    }

    /// Current absolute position.
    pub fn tell(&self) -> Result<u64> {
        let mut state = self.state.lock();
        state.handle.tell().map_err(|e| {
            debug!(stream = %self.name, error = %e, "stream tell failed");
            BridgeError::TellFailed(e.to_string())
        })
    }

    /// Total length, or [`StreamSize::Unknown`] for unsized streams.
    pub fn length(&self) -> StreamSize {
        self.state.lock().handle.size()
    }

    /// End-of-stream query. An exhausted read quota counts as end of stream.
    pub fn eof(&self) -> bool {
        let mut state = self.state.lock();
        if state.read_limit == Some(0) {
            return true;
        }
        state.handle.eof()
    }

    pub fn is_seekable(&self) -> bool {
        self.state.lock().handle.is_seekable()
    }

    /// Write all of `data` at the current position.
    pub fn write_all(&self, mut data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        while !data.is_empty() {
            let n = state.handle.write(data)?;
            if n == 0 {
                return Err(BridgeError::OperationFailed(
                    "host stream accepted no bytes".to_string(),
                ));
            }
            data = &data[n..];
        }
        Ok(())
    }

    pub fn truncate(&self, len: u64) -> Result<()> {
        self.state.lock().handle.truncate(len)
    }
}

impl io::Read for StreamIoBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match StreamIoBridge::read(self, buf) {
            ReadStatus::Continue(n) => Ok(n),
            ReadStatus::EndOfStream => Ok(0),
            ReadStatus::Abort => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("read aborted on stream {}", self.name),
            )),
        }
    }
}

impl io::Seek for StreamIoBridge {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let result = match pos {
            io::SeekFrom::Start(offset) => StreamIoBridge::seek(self, offset),
            io::SeekFrom::Current(offset) => self.seek_from(offset, SeekWhence::Current),
            io::SeekFrom::End(offset) => self.seek_from(offset, SeekWhence::End),
        };
        result
            .and_then(|_| self.tell())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the host is actually consulted.
    struct CountingStream {
        inner: MemoryStream,
        reads: Arc<AtomicUsize>,
        fail_reads: bool,
    }

    impl StreamHandle for CountingStream {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(BridgeError::Io(io::Error::new(io::ErrorKind::Other, "boom")));
            }
            self.inner.read(buf)
        }

        fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()> {
            self.inner.seek(offset, whence)
        }

        fn tell(&mut self) -> Result<u64> {
            Err(BridgeError::OperationFailed("no position".to_string()))
        }

        fn size(&mut self) -> StreamSize {
            self.inner.size()
        }

        fn eof(&mut self) -> bool {
            self.inner.eof()
        }
    }

    fn counting(data: Vec<u8>, fail_reads: bool) -> (StreamIoBridge, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let stream = CountingStream {
            inner: MemoryStream::new(data),
            reads: reads.clone(),
            fail_reads,
        };
        (StreamIoBridge::from_handle(stream, "counting"), reads)
    }

    mockall::mock! {
        Handle {}

        impl StreamHandle for Handle {
            fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
            fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()>;
            fn tell(&mut self) -> Result<u64>;
            fn size(&mut self) -> StreamSize;
            fn eof(&mut self) -> bool;
        }
    }

    #[test]
    fn test_exhausted_quota_never_reaches_host() {
        let mut handle = MockHandle::new();
        handle.expect_read().never();
        handle.expect_eof().never();

        let bridge = StreamIoBridge::new(Box::new(handle), "mock");
        bridge.set_read_limit(Some(0));
        let mut buf = [0u8; 8];

        assert_eq!(bridge.read(&mut buf), ReadStatus::EndOfStream);
        assert!(bridge.eof());
    }

    #[test]
    fn test_seek_error_wrapped() {
        let mut handle = MockHandle::new();
        handle
            .expect_seek()
            .returning(|_, _| Err(BridgeError::OperationFailed("socket closed".to_string())));

        let bridge = StreamIoBridge::new(Box::new(handle), "mock");
        let err = bridge.seek(10).unwrap_err();
        assert!(err.to_string().contains("socket closed"));
    }

    #[test]
    fn test_zero_length_read_skips_host() {
        let (bridge, reads) = counting(vec![1, 2, 3], false);
        assert_eq!(bridge.read(&mut []), ReadStatus::EndOfStream);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_statuses() {
        let bridge = StreamIoBridge::from_handle(MemoryStream::new(vec![9u8; 5]), "mem");
        let mut buf = [0u8; 4];

        assert_eq!(bridge.read(&mut buf), ReadStatus::Continue(4));
        assert_eq!(bridge.read(&mut buf), ReadStatus::Continue(1));
        assert_eq!(bridge.read(&mut buf), ReadStatus::EndOfStream);
    }

    #[test]
    fn test_host_failure_aborts() {
        let (bridge, _) = counting(vec![1, 2, 3], true);
        let mut buf = [0u8; 4];
        assert_eq!(bridge.read(&mut buf), ReadStatus::Abort);
    }

    #[test]
    fn test_tell_failure_is_error_not_position() {
        let (bridge, _) = counting(vec![1, 2, 3], false);
        assert!(matches!(bridge.tell(), Err(BridgeError::TellFailed(_))));
    }

    #[test]
    fn test_unknown_length_is_not_error() {
        let bridge = StreamIoBridge::from_handle(
            MemoryStream::new(vec![0u8; 16]).with_unknown_size(),
            "radio",
        );
        assert_eq!(bridge.length(), StreamSize::Unknown);

        let sized = StreamIoBridge::from_handle(MemoryStream::new(vec![0u8; 16]), "file");
        assert_eq!(sized.length(), StreamSize::Known(16));
    }

    #[test]
    fn test_seek_failure_reported() {
        let bridge = StreamIoBridge::from_handle(MemoryStream::new(vec![0u8; 4]).non_seekable(), "s");
        assert!(matches!(bridge.seek(2), Err(BridgeError::SeekFailed(_))));
    }

    #[test]
    fn test_read_limit_clamps_and_fakes_eof() {
        let (bridge, reads) = counting(vec![7u8; 100], false);
        bridge.set_read_limit(Some(6));
        let mut buf = [0u8; 4];

        assert_eq!(bridge.read(&mut buf), ReadStatus::Continue(4));
        assert_eq!(bridge.read(&mut buf), ReadStatus::Continue(2));
        assert!(bridge.eof());
        assert_eq!(bridge.read(&mut buf), ReadStatus::EndOfStream);
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        bridge.clear_read_limit();
        assert!(!bridge.eof());
        assert_eq!(bridge.read(&mut buf), ReadStatus::Continue(4));
    }

    #[test]
    fn test_clones_share_position() {
        let bridge = StreamIoBridge::from_handle(MemoryStream::new(vec![0u8; 10]), "shared");
        let other = bridge.clone();
        bridge.seek(7).unwrap();
        assert_eq!(other.tell().unwrap(), 7);
    }

    #[test]
    fn test_std_io_adapters() {
        use std::io::{Read, Seek, SeekFrom};

        let mut bridge = StreamIoBridge::from_handle(MemoryStream::new(vec![1u8, 2, 3, 4]), "io");
        assert_eq!(Seek::seek(&mut bridge, SeekFrom::End(-2)).unwrap(), 2);
        let mut rest = Vec::new();
        Read::read_to_end(&mut bridge, &mut rest).unwrap();
        assert_eq!(rest, vec![3, 4]);
    }

    #[test]
    fn test_write_all_on_read_only_handle() {
        let (bridge, _) = counting(vec![0u8; 4], false);
        let err = bridge.write_all(&[1, 2]).unwrap_err();
        assert!(err.is_unsupported());
    }
}
