//! # FLAC Playback Example
//!
//! Reads the tags of a FLAC file, then plays it through a sink that only
//! counts the bytes it receives.
//!
//! Run with: `cargo run --example playback_demo --package core-playback -- track.flac`

use std::time::Duration;

use anyhow::{bail, Context};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::{AudioSink, ReplayGainInfo, SampleFormat};
use bridge_traits::stream::FileStream;
use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::MetadataExtractor;
use core_playback::{DecoderConfig, PlaybackController, TransportCell};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

// ============================================================================
// Counting Sink
// ============================================================================

#[derive(Default)]
struct CountingSink {
    format: Option<(SampleFormat, u32, u16)>,
    bytes: u64,
    writes: u64,
}

impl AudioSink for CountingSink {
    fn open_audio(&mut self, format: SampleFormat, sample_rate: u32, channels: u16) -> BridgeResult<()> {
        println!("open_audio: {format:?} {sample_rate} Hz, {channels} ch");
        self.format = Some((format, sample_rate, channels));
        Ok(())
    }

    fn write_audio(&mut self, data: &[u8]) -> BridgeResult<()> {
        self.bytes += data.len() as u64;
        self.writes += 1;
        Ok(())
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        println!("bitrate: {} kbps", bitrate / 1000);
    }

    fn set_replay_gain(&mut self, info: &ReplayGainInfo) {
        println!(
            "replay gain: track {:+.2} dB (peak {:.6}), album {:+.2} dB (peak {:.6})",
            info.track_gain_db, info.track_peak, info.album_gain_db, info.album_peak
        );
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))
        .context("failed to initialise logging")?;

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: playback_demo <file.flac>");
    };

    let stream = StreamIoBridge::from_handle(
        FileStream::open(&path).with_context(|| format!("cannot open {path}"))?,
        path.clone(),
    );

    let metadata = MetadataExtractor::new()
        .extract(&stream)
        .with_context(|| format!("{path} is not a readable FLAC file"))?;
    println!("title:   {}", metadata.title.as_deref().unwrap_or("-"));
    println!("artist:  {}", metadata.artist.as_deref().unwrap_or("-"));
    println!("album:   {}", metadata.album.as_deref().unwrap_or("-"));
    println!("length:  {:?}", Duration::from_millis(metadata.length_ms.max(0) as u64));
    println!("quality: {}", metadata.quality);

    let mut controller = PlaybackController::new(DecoderConfig::default())?;
    let mut sink = CountingSink::default();
    let outcome = controller.play(stream, &mut sink, &TransportCell::new())?;

    println!(
        "{outcome:?}: {} bytes in {} writes ({:?})",
        sink.bytes, sink.writes, sink.format
    );
    Ok(())
}
