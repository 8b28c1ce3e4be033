//! # Decode Session
//!
//! Per-track decode state: the stream format established by STREAMINFO, the
//! session lifecycle, and the output buffer decoded frames are collected in.
//!
//! ## Design
//!
//! - **Capacity**: fixed at creation (`max_block_size * max_channels`
//!   samples), so one worst-case frame always fits into an empty buffer
//! - **Layout**: interleaved `i32` samples, one per channel per position
//! - **Reuse**: [`DecodeSession::reset`] and [`OutputBuffer::clear`] never
//!   reallocate; the same allocation serves every track
//! - **Ownership**: exclusive to the decode thread, no locking

use serde::{Deserialize, Serialize};

use bridge_traits::PlaybackSessionId;
use core_metadata::StreamInfo;

use crate::error::{PlaybackError, Result};

/// Lifecycle of a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No stream attached.
    Uninitialized,
    /// Stream attached, metadata not yet processed.
    MetadataPending,
    /// Metadata read, no frame decoded since the last seek.
    Ready,
    /// Frames are being decoded.
    Decoding,
    /// The decoder ran out of frames.
    EndOfStream,
    /// The session failed and must be reset.
    Error,
}

impl SessionState {
    /// Returns `true` if frames may be requested in this state.
    pub fn can_decode(&self) -> bool {
        matches!(self, Self::Ready | Self::Decoding)
    }

    /// Returns `true` if the session has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Error)
    }
}

/// Stream format fixed by STREAMINFO for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    /// Samples per channel; 0 when unknown.
    pub total_samples: u64,
}

impl From<&StreamInfo> for StreamFormat {
    fn from(info: &StreamInfo) -> Self {
        Self {
            channels: info.channels,
            sample_rate: info.sample_rate,
            bits_per_sample: info.bits_per_sample,
            total_samples: info.total_samples,
        }
    }
}

/// Fixed-capacity buffer of interleaved samples.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    samples: Vec<i32>,
    capacity: usize,
}

impl OutputBuffer {
    /// Create a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Interleave `block_size` samples from each plane onto the end of the
    /// buffer.
    ///
    /// Nothing is written when the frame does not fit or a plane is shorter
    /// than `block_size`.
    pub fn append_frame(&mut self, planes: &[Vec<i32>], block_size: usize) -> Result<usize> {
        let needed = block_size * planes.len();
        if needed > self.free_space() {
            return Err(PlaybackError::BufferOverflow {
                needed,
                available: self.free_space(),
            });
        }
        if let Some(short) = planes.iter().find(|p| p.len() < block_size) {
            return Err(PlaybackError::DecoderError(format!(
                "channel holds {} samples, frame declares {block_size}",
                short.len()
            )));
        }

        for i in 0..block_size {
            self.samples.extend(planes.iter().map(|plane| plane[i]));
        }
        Ok(needed)
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.samples
    }

    /// Samples currently buffered.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn free_space(&self) -> usize {
        self.capacity - self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all samples, keeping the allocation.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// State of one track being decoded.
#[derive(Debug)]
pub struct DecodeSession {
    id: PlaybackSessionId,
    state: SessionState,
    format: StreamFormat,
    /// Average bitrate in kbps from the metadata walk.
    bitrate: u32,
    stream_info_seen: bool,
    has_seek_table: bool,
    buffer: OutputBuffer,
    /// Samples per channel delivered since the metadata was read.
    samples_decoded: u64,
    /// Absolute sample index of the next frame, as far as the session knows.
    position: u64,
}

impl DecodeSession {
    pub fn new(capacity: usize) -> Self {
        Self {
            id: PlaybackSessionId::new(),
            state: SessionState::Uninitialized,
            format: StreamFormat::default(),
            bitrate: 0,
            stream_info_seen: false,
            has_seek_table: false,
            buffer: OutputBuffer::new(capacity),
            samples_decoded: 0,
            position: 0,
        }
    }

    /// Forget the current track. The buffer allocation is kept.
    pub fn reset(&mut self) {
        self.id = PlaybackSessionId::new();
        self.state = SessionState::Uninitialized;
        self.format = StreamFormat::default();
        self.bitrate = 0;
        self.stream_info_seen = false;
        self.has_seek_table = false;
        self.buffer.clear();
        self.samples_decoded = 0;
        self.position = 0;
    }

    pub fn id(&self) -> PlaybackSessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn stream_info_seen(&self) -> bool {
        self.stream_info_seen
    }

    pub fn has_seek_table(&self) -> bool {
        self.has_seek_table
    }

    pub fn set_has_seek_table(&mut self, present: bool) {
        self.has_seek_table = present;
    }

    /// Adopt the format and bitrate of a STREAMINFO block.
    pub fn apply_stream_info(&mut self, info: &StreamInfo, bitrate: u32) {
        self.format = StreamFormat::from(info);
        self.bitrate = bitrate;
        self.stream_info_seen = true;
    }

    /// Check a frame against the session format.
    pub fn check_frame(&self, channels: u16, sample_rate: u32) -> Result<()> {
        if channels != self.format.channels || sample_rate != self.format.sample_rate {
            return Err(PlaybackError::FormatMismatch {
                expected_channels: self.format.channels,
                expected_rate: self.format.sample_rate,
                channels,
                sample_rate,
            });
        }
        Ok(())
    }

    /// Append a validated frame and advance the counters.
    pub fn push_frame(&mut self, planes: &[Vec<i32>], block_size: usize) -> Result<usize> {
        let written = self.buffer.append_frame(planes, block_size)?;
        self.samples_decoded += block_size as u64;
        self.position += block_size as u64;
        Ok(written)
    }

    pub fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn samples_decoded(&self) -> u64 {
        self.samples_decoded
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, sample: u64) {
        self.position = sample;
    }
}
