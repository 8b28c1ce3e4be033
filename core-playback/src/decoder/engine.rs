//! # Decode Engine Contract
//!
//! The frame decoder is a pull-based engine: the decode loop asks it to make
//! progress and the engine calls back into a [`DecoderClient`] with whatever
//! it produced. The engine reads its input only through the
//! [`StreamIoBridge`] it was reset with.
//!
//! ```text
//! FrameDecodeLoop ──process_*──▶ DecodeEngine ──read/seek──▶ StreamIoBridge
//!        ▲                             │
//!        └──── write / metadata / error┘
//! ```

use serde::{Deserialize, Serialize};

use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::MetadataBlock;

use crate::error::Result;

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No stream attached.
    Unattached,
    /// Stream attached, metadata not processed yet.
    SearchForMetadata,
    /// Positioned at audio frames.
    ReadFrame,
    /// No more frames.
    EndOfStream,
    /// A write callback aborted decoding; `flush` or a seek recovers.
    Aborted,
}

/// Recoverable decoder errors reported through [`DecoderClient::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeErrorStatus {
    /// Frame sync was lost; the engine is searching for the next frame.
    LostSync,
    /// A frame header was invalid.
    BadHeader,
    /// Frame CRC did not match; the frame was dropped.
    FrameCrcMismatch,
    /// The frame uses a feature the engine cannot decode.
    UnparseableStream,
}

/// Verdict of a write callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Continue,
    Abort,
}

/// One decoded frame, one plane of right-justified samples per channel.
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    /// Samples per channel.
    pub block_size: usize,
    pub planes: &'a [Vec<i32>],
}

/// Receiver of engine callbacks.
pub trait DecoderClient {
    /// A frame was decoded.
    fn write(&mut self, frame: &DecodedFrame<'_>) -> WriteStatus;

    /// A metadata block was read, in file order.
    fn metadata(&mut self, block: &MetadataBlock);

    /// The engine hit a recoverable error.
    fn error(&mut self, status: DecodeErrorStatus);
}

/// Pull-based frame decoder.
///
/// Exactly one thread drives an engine; none of these methods block except
/// on reads from the attached stream.
pub trait DecodeEngine: Send {
    /// Attach `stream`, dropping any previous stream and state.
    fn reset(&mut self, stream: StreamIoBridge) -> Result<()>;

    /// Read every metadata block, delivering each through
    /// [`DecoderClient::metadata`], and position at the first frame.
    fn process_until_end_of_metadata(&mut self, client: &mut dyn DecoderClient) -> Result<()>;

    /// Decode at most one frame.
    ///
    /// Either one frame is written, one error is reported, or the engine
    /// moves to [`EngineState::EndOfStream`]. A write callback returning
    /// [`WriteStatus::Abort`] moves the engine to [`EngineState::Aborted`]
    /// and yields `Err`.
    fn process_single(&mut self, client: &mut dyn DecoderClient) -> Result<()>;

    /// Position so the next frame starts at absolute sample `sample`.
    fn seek_absolute(&mut self, sample: u64) -> Result<()>;

    /// Drop partially decoded state, keeping the stream position.
    fn flush(&mut self) -> Result<()>;

    fn state(&self) -> EngineState;

    /// Detach the stream.
    fn release(&mut self);
}
