//! # Playback Controller
//!
//! The per-track play loop: reads the metadata, configures the host sink,
//! then decodes, converts and writes frames until the stream ends or the
//! transport asks to stop.
//!
//! ## Flow
//!
//! ```text
//! read_metadata ─▶ set_replay_gain ─▶ open_audio ─▶ set_bitrate
//!       │
//!       ▼
//! ┌─▶ stop? ─▶ seek? ─▶ paused? ─▶ decode_frame ─▶ squeeze ─▶ write_audio ─┐
//! └─────────────────────────────────────────────────────────────────────────┘
//!       │ end of stream
//!       ▼
//! drain while buffer_playing ─▶ close_audio ─▶ flush ─▶ release
//! ```
//!
//! Transport changes are observed between frames only.

use tracing::{debug, info, instrument, warn};

use bridge_traits::playback::{AudioSink, SampleFormat};
use bridge_traits::stream_io::StreamIoBridge;

use crate::config::DecoderConfig;
use crate::decode_loop::{DecodeStatus, FrameDecodeLoop};
use crate::decoder::{DecodeEngine, SampleConverter};
use crate::error::{PlaybackError, Result};
use crate::transport::TransportCell;

#[cfg(feature = "symphonia-engine")]
use crate::decoder::SymphoniaEngine;

/// How a call to [`PlaybackController::play`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The stream played to its end and the sink drained.
    Finished,
    /// The transport requested a stop.
    Stopped,
}

/// Owns a [`FrameDecodeLoop`] and plays one track at a time through it.
pub struct PlaybackController<E: DecodeEngine> {
    decoder: FrameDecodeLoop<E>,
    /// Reused conversion buffer for sink writes.
    scratch: Vec<u8>,
}

#[cfg(feature = "symphonia-engine")]
impl PlaybackController<SymphoniaEngine> {
    pub fn new(config: DecoderConfig) -> Result<Self> {
        Ok(Self::from_decoder(FrameDecodeLoop::new(config)?))
    }
}

impl<E: DecodeEngine> PlaybackController<E> {
    pub fn with_engine(engine: E, config: DecoderConfig) -> Result<Self> {
        Ok(Self::from_decoder(FrameDecodeLoop::with_engine(engine, config)?))
    }

    pub fn from_decoder(decoder: FrameDecodeLoop<E>) -> Self {
        Self {
            decoder,
            scratch: Vec::new(),
        }
    }

    pub fn decoder(&self) -> &FrameDecodeLoop<E> {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut FrameDecodeLoop<E> {
        &mut self.decoder
    }

    /// Play `stream` through `sink` until it ends or `transport` stops it.
    ///
    /// The sink is closed and the decoder flushed and released however the
    /// track ends.
    #[instrument(skip_all, fields(stream = stream.name()))]
    pub fn play(
        &mut self,
        stream: StreamIoBridge,
        sink: &mut dyn AudioSink,
        transport: &TransportCell,
    ) -> Result<PlaybackOutcome> {
        let result = self.run(stream, sink, transport);

        sink.close_audio();
        if let Err(e) = self.decoder.flush() {
            debug!(error = %e, "flush after playback failed");
        }
        self.decoder.release();

        match &result {
            Ok(outcome) => info!(?outcome, "playback ended"),
            Err(e) => warn!(error = %e, "playback failed"),
        }
        result
    }

    fn run(
        &mut self,
        stream: StreamIoBridge,
        sink: &mut dyn AudioSink,
        transport: &TransportCell,
    ) -> Result<PlaybackOutcome> {
        let metadata = self.decoder.read_metadata(stream)?;
        let replay_gain = metadata.replay_gain.as_ref().map(|rg| rg.to_info());
        let bitrate = metadata.bitrate;
        let format = *self.decoder.session().format();

        if let Some(info) = replay_gain {
            sink.set_replay_gain(&info);
        }
        sink.open_audio(
            SampleFormat::for_bits_per_sample(format.bits_per_sample),
            format.sample_rate,
            format.channels,
        )
        .map_err(|e| PlaybackError::AudioDeviceError(e.to_string()))?;
        sink.set_bitrate(bitrate.saturating_mul(1000));

        let pause_interval = self.decoder.config().pause_poll_interval;
        let drain_interval = self.decoder.config().drain_poll_interval;
        let mut paused = false;

        loop {
            if transport.stop_requested() {
                return Ok(PlaybackOutcome::Stopped);
            }

            if let Some(ms) = transport.take_seek() {
                debug!(ms, "applying seek");
                sink.flush(ms);
                self.decoder.seek_to(ms)?;
                continue;
            }

            if transport.is_paused() {
                if !paused {
                    sink.pause(true);
                    paused = true;
                }
                transport.park(pause_interval);
                continue;
            }
            if paused {
                sink.pause(false);
                paused = false;
            }

            match self.decoder.decode_frame()? {
                DecodeStatus::Frame(_) => self.write_output(sink, format.bits_per_sample)?,
                DecodeStatus::Skipped => {}
                DecodeStatus::EndOfStream => {
                    if !sink.buffer_playing() {
                        return Ok(PlaybackOutcome::Finished);
                    }
                    transport.park(drain_interval);
                }
            }
        }
    }

    /// Convert the buffered samples and hand them to the sink in
    /// `output_block_size` chunks, then empty the buffer.
    fn write_output(&mut self, sink: &mut dyn AudioSink, bits: u32) -> Result<()> {
        let chunk_size = self.decoder.config().output_block_size;
        for chunk in self.decoder.output().chunks(chunk_size) {
            SampleConverter::squeeze(chunk, bits, &mut self.scratch)?;
            sink.write_audio(&self.scratch)
                .map_err(|e| PlaybackError::AudioDeviceError(e.to_string()))?;
        }
        self.decoder.clear_output();
        Ok(())
    }
}
