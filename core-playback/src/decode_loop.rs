//! # Frame Decode Loop
//!
//! Drives a [`DecodeEngine`] for one track at a time and owns everything the
//! engine's callbacks touch: the [`DecodeSession`], its output buffer, and
//! the [`TrackMetadata`] built while the metadata blocks stream past.
//!
//! ## Overview
//!
//! - [`FrameDecodeLoop::read_metadata`] attaches a stream and processes the
//!   metadata section; STREAMINFO fixes the session format
//! - [`FrameDecodeLoop::decode_frame`] asks the engine for exactly one frame
//!   and appends it to the output buffer
//! - [`FrameDecodeLoop::seek_to`] maps a playback position in milliseconds
//!   to an absolute sample
//! - [`FrameDecodeLoop::flush`] drops partially decoded engine state
//!
//! A frame whose channel count or sample rate differs from STREAMINFO, whose
//! bit depth cannot be packed, or that does not fit the buffer aborts the
//! write. Samples already buffered are left as they were.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_traits::{FileStream, StreamIoBridge};
//! use core_playback::{DecodeStatus, DecoderConfig, FrameDecodeLoop};
//!
//! # fn main() -> core_playback::Result<()> {
//! let stream = StreamIoBridge::from_handle(FileStream::open("song.flac")?, "song.flac");
//! let mut decoder = FrameDecodeLoop::new(DecoderConfig::default())?;
//! decoder.read_metadata(stream)?;
//!
//! while let DecodeStatus::Frame(_) | DecodeStatus::Skipped = decoder.decode_frame()? {
//!     // hand decoder.output() to the sink
//!     decoder.clear_output();
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use bridge_traits::stream::StreamSize;
use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::{MetadataBlock, MetadataError, MetadataExtractor, TrackMetadata};

use crate::config::DecoderConfig;
use crate::decoder::{
    DecodeEngine, DecodeErrorStatus, DecodedFrame, DecoderClient, EngineState, SampleConverter,
    WriteStatus,
};
use crate::error::{PlaybackError, Result};
use crate::session::{DecodeSession, SessionState, StreamFormat};

#[cfg(feature = "symphonia-engine")]
use crate::decoder::SymphoniaEngine;

/// Outcome of one [`FrameDecodeLoop::decode_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A frame of this many samples per channel was buffered.
    Frame(usize),
    /// The engine reported a recoverable error instead of a frame.
    Skipped,
    /// No more frames.
    EndOfStream,
}

/// Result of [`FrameDecodeLoop::probe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub format: StreamFormat,
    pub metadata: TrackMetadata,
    pub has_seek_table: bool,
}

/// Playback position in milliseconds to an absolute sample index, rounded
/// down.
pub fn sample_for_ms(ms: u64, sample_rate: u32) -> u64 {
    let sample = u128::from(ms) * u128::from(sample_rate) / 1000;
    u64::try_from(sample).unwrap_or(u64::MAX)
}

/// Engine callbacks, borrowing the loop's fields for one engine call.
struct SessionClient<'a> {
    session: &'a mut DecodeSession,
    metadata: &'a mut TrackMetadata,
    extractor: &'a MetadataExtractor,
    stream_size: StreamSize,
    max_consecutive_errors: u32,
    consecutive_errors: &'a mut u32,
    testing: bool,
    /// First error recorded by a callback; takes precedence over whatever
    /// the engine returns.
    failure: Option<PlaybackError>,
    /// Samples per channel buffered during this call.
    written: usize,
}

impl SessionClient<'_> {
    fn abort(&mut self, err: PlaybackError) -> WriteStatus {
        if self.testing {
            debug!(session = %self.session.id(), error = %err, "frame rejected");
        } else {
            warn!(session = %self.session.id(), error = %err, "frame rejected");
        }
        self.failure.get_or_insert(err);
        WriteStatus::Abort
    }
}

impl DecoderClient for SessionClient<'_> {
    fn write(&mut self, frame: &DecodedFrame<'_>) -> WriteStatus {
        if !self.session.stream_info_seen() {
            return self.abort(PlaybackError::InvalidState(
                "frame delivered before STREAMINFO".to_string(),
            ));
        }
        if !SampleConverter::is_supported(frame.bits_per_sample) {
            return self.abort(PlaybackError::UnsupportedBitDepth(frame.bits_per_sample));
        }
        if let Err(e) = self.session.check_frame(frame.channels, frame.sample_rate) {
            return self.abort(e);
        }
        if frame.planes.len() != usize::from(frame.channels) {
            return self.abort(PlaybackError::DecoderError(format!(
                "frame declares {} channels but carries {}",
                frame.channels,
                frame.planes.len()
            )));
        }

        match self.session.push_frame(frame.planes, frame.block_size) {
            Ok(_) => {
                *self.consecutive_errors = 0;
                self.written += frame.block_size;
                WriteStatus::Continue
            }
            Err(e) => self.abort(e),
        }
    }

    fn metadata(&mut self, block: &MetadataBlock) {
        self.extractor
            .apply_block(self.metadata, block, self.stream_size);
        match block {
            MetadataBlock::StreamInfo(info) => {
                self.session.apply_stream_info(info, self.metadata.bitrate);
            }
            MetadataBlock::SeekTable(_) => self.session.set_has_seek_table(true),
            _ => {}
        }
    }

    fn error(&mut self, status: DecodeErrorStatus) {
        *self.consecutive_errors += 1;
        let count = *self.consecutive_errors;
        if self.testing {
            debug!(?status, count, "decoder error");
        } else {
            error!(session = %self.session.id(), ?status, count, "decoder error");
        }

        if count > self.max_consecutive_errors && self.failure.is_none() {
            self.failure = Some(PlaybackError::DecoderError(format!(
                "{count} consecutive decoder errors, last {status:?}"
            )));
        }
    }
}

fn settle<T>(result: Result<T>, failure: Option<PlaybackError>) -> Result<T> {
    match failure {
        Some(err) => Err(err),
        None => result,
    }
}

/// Decode driver for one track at a time.
pub struct FrameDecodeLoop<E: DecodeEngine> {
    engine: E,
    config: DecoderConfig,
    session: DecodeSession,
    metadata: TrackMetadata,
    extractor: MetadataExtractor,
    stream: Option<StreamIoBridge>,
    stream_size: StreamSize,
    /// Probing: decoder errors are expected and only logged at debug.
    testing: bool,
    consecutive_errors: u32,
}

#[cfg(feature = "symphonia-engine")]
impl FrameDecodeLoop<SymphoniaEngine> {
    /// Create a loop backed by the Symphonia FLAC engine.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        Self::with_engine(SymphoniaEngine::new(), config)
    }
}

impl<E: DecodeEngine> FrameDecodeLoop<E> {
    /// Create a loop around `engine`.
    ///
    /// The output buffer is allocated here, once, at
    /// [`DecoderConfig::buffer_capacity`] samples.
    pub fn with_engine(engine: E, config: DecoderConfig) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;
        Ok(Self {
            engine,
            session: DecodeSession::new(config.buffer_capacity()),
            config,
            metadata: TrackMetadata::new(),
            extractor: MetadataExtractor::new(),
            stream: None,
            stream_size: StreamSize::Unknown,
            testing: false,
            consecutive_errors: 0,
        })
    }

    /// Run one engine call with a client borrowing the session.
    ///
    /// Returns the engine's result, the first failure recorded by a
    /// callback, and the samples per channel buffered.
    fn drive<T>(
        &mut self,
        op: impl FnOnce(&mut E, &mut dyn DecoderClient) -> Result<T>,
    ) -> (Result<T>, Option<PlaybackError>, usize) {
        let mut client = SessionClient {
            session: &mut self.session,
            metadata: &mut self.metadata,
            extractor: &self.extractor,
            stream_size: self.stream_size,
            max_consecutive_errors: self.config.max_consecutive_errors,
            consecutive_errors: &mut self.consecutive_errors,
            testing: self.testing,
            failure: None,
            written: 0,
        };
        let result = op(&mut self.engine, &mut client);
        let SessionClient {
            failure, written, ..
        } = client;
        (result, failure, written)
    }

    fn reset_session(&mut self) {
        self.session.reset();
        self.metadata = TrackMetadata::new();
        self.stream = None;
        self.stream_size = StreamSize::Unknown;
        self.consecutive_errors = 0;
    }

    /// Attach `stream` and process its metadata section.
    ///
    /// Any previous session is discarded first, so calling this twice on the
    /// same stream yields the same metadata. On failure the session is reset
    /// and left in [`SessionState::Error`]; reopen the stream to retry.
    #[instrument(skip(self, stream), fields(stream = stream.name()))]
    pub fn read_metadata(&mut self, stream: StreamIoBridge) -> Result<&TrackMetadata> {
        self.reset_session();
        self.stream_size = stream.length();
        stream.set_read_limit(Some(self.config.probe_read_limit));
        let result = self.process_metadata(&stream);
        stream.clear_read_limit();

        match result {
            Ok(()) => {
                let format = *self.session.format();
                info!(
                    session = %self.session.id(),
                    channels = format.channels,
                    sample_rate = format.sample_rate,
                    bits = format.bits_per_sample,
                    total_samples = format.total_samples,
                    "metadata read"
                );
                self.stream = Some(stream);
                self.session.set_state(SessionState::Ready);
                Ok(&self.metadata)
            }
            Err(err) => {
                if self.testing {
                    debug!(error = %err, "stream rejected");
                } else {
                    warn!(error = %err, "failed to read metadata");
                }
                self.engine.release();
                self.reset_session();
                self.session.set_state(SessionState::Error);
                Err(err)
            }
        }
    }

    fn process_metadata(&mut self, stream: &StreamIoBridge) -> Result<()> {
        self.engine.reset(stream.clone())?;
        self.session.set_state(SessionState::MetadataPending);

        let (result, failure, _) =
            self.drive(|engine, client| engine.process_until_end_of_metadata(client));
        settle(result, failure)?;

        if !self.session.stream_info_seen() {
            return Err(PlaybackError::Metadata(MetadataError::MissingStreamInfo));
        }
        let channels = self.session.format().channels;
        if channels == 0 || channels > self.config.max_channels {
            return Err(PlaybackError::UnsupportedChannels(channels));
        }
        Ok(())
    }

    /// Decode exactly one frame into the output buffer.
    pub fn decode_frame(&mut self) -> Result<DecodeStatus> {
        match self.session.state() {
            SessionState::Ready | SessionState::Decoding => {}
            SessionState::EndOfStream => return Ok(DecodeStatus::EndOfStream),
            state => {
                return Err(PlaybackError::InvalidState(format!(
                    "cannot decode in state {state:?}"
                )))
            }
        }
        if self.engine.state() == EngineState::Aborted {
            return Err(PlaybackError::Aborted(
                "decoder aborted, flush or seek to resume".to_string(),
            ));
        }

        self.session.set_state(SessionState::Decoding);
        let (result, failure, written) = self.drive(|engine, client| engine.process_single(client));
        if let Err(err) = settle(result, failure) {
            if err.is_fatal() {
                self.session.set_state(SessionState::Error);
            }
            return Err(err);
        }

        if written > 0 {
            return Ok(DecodeStatus::Frame(written));
        }
        if self.engine.state() == EngineState::EndOfStream {
            debug!(
                samples = self.session.samples_decoded(),
                "end of stream"
            );
            self.session.set_state(SessionState::EndOfStream);
            return Ok(DecodeStatus::EndOfStream);
        }
        Ok(DecodeStatus::Skipped)
    }

    /// Seek so the next decoded frame starts at `ms` milliseconds.
    ///
    /// Returns the absolute sample requested from the engine. Buffered
    /// samples are discarded.
    #[instrument(skip(self), level = "debug")]
    pub fn seek_to(&mut self, ms: u64) -> Result<u64> {
        match self.session.state() {
            SessionState::Ready | SessionState::Decoding | SessionState::EndOfStream => {}
            state => {
                return Err(PlaybackError::InvalidState(format!(
                    "cannot seek in state {state:?}"
                )))
            }
        }

        let sample = sample_for_ms(ms, self.session.format().sample_rate);
        self.session.clear_buffer();
        if let Err(err) = self.engine.seek_absolute(sample) {
            self.session.set_state(SessionState::Error);
            return Err(err);
        }

        self.session.set_position(sample);
        self.session.set_state(SessionState::Ready);
        self.consecutive_errors = 0;
        Ok(sample)
    }

    /// Reset the engine's partially decoded state and drop buffered samples.
    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()?;
        self.session.clear_buffer();
        self.consecutive_errors = 0;
        if self.session.state() == SessionState::Decoding {
            self.session.set_state(SessionState::Ready);
        }
        Ok(())
    }

    /// Check whether `stream` is a FLAC stream this loop can play.
    ///
    /// Runs the metadata pass quietly, then releases the stream.
    pub fn probe(&mut self, stream: StreamIoBridge) -> Result<ProbeResult> {
        self.testing = true;
        let result = self.read_metadata(stream).cloned().and_then(|metadata| {
            let format = *self.session.format();
            if !SampleConverter::is_supported(format.bits_per_sample) {
                return Err(PlaybackError::UnsupportedBitDepth(format.bits_per_sample));
            }
            Ok(ProbeResult {
                format,
                metadata,
                has_seek_table: self.session.has_seek_table(),
            })
        });
        self.testing = false;
        self.release();
        result
    }

    /// Detach the stream and reset the session.
    pub fn release(&mut self) {
        self.engine.release();
        self.reset_session();
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn stream(&self) -> Option<&StreamIoBridge> {
        self.stream.as_ref()
    }

    /// Interleaved samples buffered since the last [`clear_output`](Self::clear_output).
    pub fn output(&self) -> &[i32] {
        self.session.buffer().as_slice()
    }

    pub fn clear_output(&mut self) {
        self.session.clear_buffer();
    }
}
