//! # Symphonia FLAC Engine
//!
//! [`DecodeEngine`] implementation on top of Symphonia's FLAC reader and
//! decoder.
//!
//! The metadata section is walked by `core-metadata` so the client sees
//! every block (Symphonia only surfaces a subset). Once the walk succeeds a
//! [`FlacReader`] is built over the same bridge, offset past any ID3v2
//! preamble, and frames are pulled from it one packet at a time.

use std::io::{self, Read, Seek, SeekFrom};

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia_bundle_flac::{FlacDecoder, FlacReader};
use tracing::{debug, error, info, instrument, trace, warn};

use bridge_traits::stream::SeekWhence;
use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::blocks::walk_metadata;

use crate::decoder::engine::{
    DecodeEngine, DecodeErrorStatus, DecodedFrame, DecoderClient, EngineState, WriteStatus,
};
use crate::decoder::frame_header::FrameHeader;
use crate::error::{PlaybackError, Result};

/// Media source over a bridge, with position 0 at the `fLaC` marker.
struct BridgeSource {
    bridge: StreamIoBridge,
    base: u64,
}

impl BridgeSource {
    fn new(bridge: StreamIoBridge, base: u64) -> io::Result<Self> {
        let mut source = Self { bridge, base };
        source.seek(SeekFrom::Start(0))?;
        Ok(source)
    }

    fn relative_position(&self) -> io::Result<u64> {
        let pos = self.bridge.tell().map_err(to_io_error)?;
        Ok(pos.saturating_sub(self.base))
    }
}

impl Read for BridgeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.bridge, buf)
    }
}

impl Seek for BridgeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = match pos {
            SeekFrom::Start(offset) => self.bridge.seek(self.base + offset),
            SeekFrom::Current(offset) => self.bridge.seek_from(offset, SeekWhence::Current),
            SeekFrom::End(offset) => self.bridge.seek_from(offset, SeekWhence::End),
        };
        result.map_err(to_io_error)?;
        self.relative_position()
    }
}

impl MediaSource for BridgeSource {
    fn is_seekable(&self) -> bool {
        self.bridge.is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        self.bridge
            .length()
            .known()
            .map(|len| len.saturating_sub(self.base))
    }
}

fn to_io_error(err: bridge_traits::BridgeError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

/// Reader, decoder and track of an attached stream.
struct Pipeline {
    reader: FlacReader,
    decoder: FlacDecoder,
    track_id: u32,
    bits_per_sample: u32,
}

/// FLAC decode engine backed by Symphonia.
///
/// ## State Management
///
/// - `reset` attaches a stream and moves to `SearchForMetadata`
/// - `process_until_end_of_metadata` builds the Symphonia pipeline
/// - `process_single` pulls one packet per call
/// - Samples skipped after an accurate seek are trimmed here, so the first
///   frame written after `seek_absolute(n)` starts at sample `n`
/// - Channel count and sample rate are read from each frame's own header
/// - The reader resyncs silently past frames it refuses (including frames
///   whose format differs from STREAMINFO); a jump in packet timestamps is
///   reported as [`DecodeErrorStatus::LostSync`] before the next frame
pub struct SymphoniaEngine {
    stream: Option<StreamIoBridge>,
    pipeline: Option<Pipeline>,
    state: EngineState,
    /// Reusable per-channel sample planes.
    planes: Vec<Vec<i32>>,
    /// Samples still to drop after an accurate seek.
    pending_skip: u64,
    /// Timestamp the next packet should carry; unknown after a seek.
    next_ts: Option<u64>,
    /// Packet read past a gap, decoded on the following call.
    held: Option<Packet>,
}

impl Default for SymphoniaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self {
            stream: None,
            pipeline: None,
            state: EngineState::Unattached,
            planes: Vec::new(),
            pending_skip: 0,
            next_ts: None,
            held: None,
        }
    }

    fn open_pipeline(stream: &StreamIoBridge, stream_start: u64) -> Result<Pipeline> {
        let source = BridgeSource::new(stream.clone(), stream_start)?;
        let mss = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());

        let reader = FlacReader::try_new(mss, &FormatOptions::default()).map_err(|e| {
            error!("FLAC reader rejected stream: {}", e);
            PlaybackError::DecoderError(format!("failed to open FLAC reader: {e}"))
        })?;

        let track = reader
            .default_track()
            .ok_or_else(|| PlaybackError::InvalidFormat("stream has no audio track".to_string()))?;
        let track_id = track.id;
        let bits_per_sample = track.codec_params.bits_per_sample.ok_or_else(|| {
            PlaybackError::InvalidFormat("missing bits per sample".to_string())
        })?;

        let decoder = FlacDecoder::try_new(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                PlaybackError::DecoderError(format!("failed to create FLAC decoder: {e}"))
            })?;

        Ok(Pipeline {
            reader,
            decoder,
            track_id,
            bits_per_sample,
        })
    }

    fn error_status(err: &SymphoniaError) -> DecodeErrorStatus {
        match err {
            SymphoniaError::DecodeError(msg) if msg.contains("crc") => {
                DecodeErrorStatus::FrameCrcMismatch
            }
            SymphoniaError::DecodeError(_) => DecodeErrorStatus::BadHeader,
            SymphoniaError::Unsupported(_) => DecodeErrorStatus::UnparseableStream,
            _ => DecodeErrorStatus::LostSync,
        }
    }
}

impl DecodeEngine for SymphoniaEngine {
    fn reset(&mut self, stream: StreamIoBridge) -> Result<()> {
        self.release();
        debug!(stream = stream.name(), "engine attached");
        self.stream = Some(stream);
        self.state = EngineState::SearchForMetadata;
        Ok(())
    }

    #[instrument(skip(self, client), level = "debug")]
    fn process_until_end_of_metadata(&mut self, client: &mut dyn DecoderClient) -> Result<()> {
        if self.state != EngineState::SearchForMetadata {
            return Err(PlaybackError::InvalidState(format!(
                "metadata requested in state {:?}",
                self.state
            )));
        }
        let stream = self
            .stream
            .clone()
            .ok_or_else(|| PlaybackError::InvalidState("no stream attached".to_string()))?;

        let chain = match walk_metadata(&stream, |block| client.metadata(block)) {
            Ok(chain) => chain,
            Err(e) => {
                self.state = EngineState::Aborted;
                return Err(e.into());
            }
        };

        match Self::open_pipeline(&stream, chain.stream_start) {
            Ok(pipeline) => {
                info!(
                    stream = stream.name(),
                    blocks = chain.blocks.len(),
                    bits = pipeline.bits_per_sample,
                    "decoder initialized"
                );
                self.pipeline = Some(pipeline);
                self.state = EngineState::ReadFrame;
                Ok(())
            }
            Err(e) => {
                self.state = EngineState::Aborted;
                Err(e)
            }
        }
    }

    fn process_single(&mut self, client: &mut dyn DecoderClient) -> Result<()> {
        match self.state {
            EngineState::ReadFrame => {}
            EngineState::SearchForMetadata => return self.process_until_end_of_metadata(client),
            EngineState::EndOfStream | EngineState::Aborted => return Ok(()),
            EngineState::Unattached => {
                return Err(PlaybackError::InvalidState("no stream attached".to_string()))
            }
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(PlaybackError::InvalidState("decoder not initialized".to_string()));
        };

        loop {
            let next = match self.held.take() {
                Some(packet) => Ok(packet),
                None => pipeline.reader.next_packet(),
            };
            let packet = match next {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    self.state = EngineState::EndOfStream;
                    return Ok(());
                }
                Err(SymphoniaError::IoError(e)) => {
                    warn!("I/O error reading packet: {}", e);
                    self.state = EngineState::Aborted;
                    return Err(PlaybackError::SourceError(format!("failed to read packet: {e}")));
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.state = EngineState::Aborted;
                    return Err(PlaybackError::DecoderError(
                        "track list changed, reset required".to_string(),
                    ));
                }
                Err(e) => {
                    client.error(Self::error_status(&e));
                    return Ok(());
                }
            };

            if packet.track_id() != pipeline.track_id {
                continue;
            }

            if let Some(expected) = self.next_ts {
                if packet.ts() > expected {
                    warn!(expected, found = packet.ts(), "frames skipped by reader");
                    self.next_ts = Some(packet.ts());
                    self.held = Some(packet);
                    client.error(DecodeErrorStatus::LostSync);
                    return Ok(());
                }
            }
            self.next_ts = Some(packet.ts() + packet.dur());
            let header = FrameHeader::parse(packet.buf());

            let decoded = match pipeline.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("Skipping packet: {}", e);
                    client.error(Self::error_status(&e));
                    return Ok(());
                }
            };

            let AudioBufferRef::S32(buf) = decoded else {
                self.state = EngineState::Aborted;
                return Err(PlaybackError::DecoderError(
                    "FLAC decoder produced non 32-bit samples".to_string(),
                ));
            };

            let planes = buf.spec().channels.count();
            let channels = header.map_or(planes as u16, |h| h.channels);
            let sample_rate = header
                .and_then(|h| h.sample_rate)
                .unwrap_or(buf.spec().rate);
            let frames = buf.frames();
            let skip = usize::try_from(self.pending_skip).unwrap_or(usize::MAX).min(frames);
            self.pending_skip -= skip as u64;
            if skip == frames {
                trace!(frames, "dropping frame before seek target");
                continue;
            }

            // Symphonia left-justifies samples in the 32-bit word.
            let shift = 32u32.saturating_sub(pipeline.bits_per_sample);
            self.planes.resize_with(planes, Vec::new);
            for (ch, plane) in self.planes.iter_mut().enumerate() {
                plane.clear();
                plane.extend(buf.chan(ch)[skip..].iter().map(|&s| s >> shift));
            }

            let frame = DecodedFrame {
                channels,
                sample_rate,
                bits_per_sample: pipeline.bits_per_sample,
                block_size: frames - skip,
                planes: &self.planes[..planes],
            };
            trace!(block_size = frame.block_size, ts = packet.ts(), "frame decoded");

            return match client.write(&frame) {
                WriteStatus::Continue => Ok(()),
                WriteStatus::Abort => {
                    self.state = EngineState::Aborted;
                    Err(PlaybackError::Aborted("write callback aborted decoding".to_string()))
                }
            };
        }
    }

    fn seek_absolute(&mut self, sample: u64) -> Result<()> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| PlaybackError::InvalidState("decoder not initialized".to_string()))?;

        let seeked = pipeline
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: sample,
                    track_id: pipeline.track_id,
                },
            )
            .map_err(|e| {
                warn!(sample, "seek failed: {}", e);
                PlaybackError::SeekFailed(format!("seek to sample {sample}: {e}"))
            })?;

        pipeline.decoder.reset();
        self.pending_skip = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.next_ts = None;
        self.held = None;
        self.state = EngineState::ReadFrame;
        debug!(
            sample,
            actual = seeked.actual_ts,
            skip = self.pending_skip,
            "seeked"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.decoder.reset();
            self.pending_skip = 0;
            self.next_ts = None;
            self.held = None;
            self.state = EngineState::ReadFrame;
        }
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn release(&mut self) {
        self.pipeline = None;
        self.stream = None;
        self.pending_skip = 0;
        self.next_ts = None;
        self.held = None;
        self.state = EngineState::Unattached;
    }
}
