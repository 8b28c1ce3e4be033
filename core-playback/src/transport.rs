//! # Transport Cell
//!
//! Shared flags between the host's transport controls and the decode
//! thread.
//!
//! The play loop polls the cell once per decoded frame, so stop and seek
//! requests take effect at frame granularity, never in the middle of a
//! frame. A seek requested while a frame is being decoded is applied before
//! the next one.
//!
//! ```rust
//! use core_playback::TransportCell;
//!
//! let transport = TransportCell::new();
//! let control = transport.clone();
//!
//! control.request_seek(5_000);
//! assert_eq!(transport.take_seek(), Some(5_000));
//! assert_eq!(transport.take_seek(), None);
//! ```

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

const NO_SEEK: i64 = -1;

struct TransportInner {
    stop: AtomicBool,
    /// Pending seek in milliseconds, [`NO_SEEK`] when none.
    seek_ms: AtomicI64,
    paused: AtomicBool,
    /// Only used to park the decode thread; the flags are lock-free.
    park_lock: Mutex<()>,
    wake: Condvar,
}

/// Cloneable stop/seek/pause cell.
#[derive(Clone)]
pub struct TransportCell {
    inner: Arc<TransportInner>,
}

impl std::fmt::Debug for TransportCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCell")
            .field("stop", &self.stop_requested())
            .field("pending_seek", &self.pending_seek())
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl Default for TransportCell {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TransportInner {
                stop: AtomicBool::new(false),
                seek_ms: AtomicI64::new(NO_SEEK),
                paused: AtomicBool::new(false),
                park_lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    fn notify(&self) {
        let _guard = self.inner.park_lock.lock();
        self.inner.wake.notify_all();
    }

    /// Ask the play loop to stop after the current frame.
    pub fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
        self.notify();
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// Request a seek to `ms`. A later request replaces an unapplied one.
    pub fn request_seek(&self, ms: u64) {
        let ms = i64::try_from(ms).unwrap_or(i64::MAX);
        self.inner.seek_ms.store(ms, Ordering::Release);
        self.notify();
    }

    /// Take the pending seek, if any.
    pub fn take_seek(&self) -> Option<u64> {
        let ms = self.inner.seek_ms.swap(NO_SEEK, Ordering::AcqRel);
        u64::try_from(ms).ok()
    }

    /// Peek at the pending seek without taking it.
    pub fn pending_seek(&self) -> Option<u64> {
        u64::try_from(self.inner.seek_ms.load(Ordering::Acquire)).ok()
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.store(paused, Ordering::Release);
        self.notify();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Clear every flag before the next track.
    pub fn reset(&self) {
        self.inner.stop.store(false, Ordering::Release);
        self.inner.seek_ms.store(NO_SEEK, Ordering::Release);
        self.inner.paused.store(false, Ordering::Release);
    }

    /// Sleep up to `timeout`, returning early on any transport change.
    ///
    /// Returns immediately when a stop or seek is already pending.
    pub fn park(&self, timeout: Duration) {
        let mut guard = self.inner.park_lock.lock();
        if self.stop_requested() || self.pending_seek().is_some() {
            return;
        }
        let _ = self.inner.wake.wait_for(&mut guard, timeout);
    }
}
