//! Playback bridge traits and supporting audio types.
//!
//! The decode core pushes interleaved PCM into a host-provided [`AudioSink`].
//! The sink owns the audio device, its buffering, and the mapping from
//! [`SampleFormat`] to whatever the platform mixer wants.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::Result, platform::PlatformSend};

/// PCM sample layouts the decoder can emit.
///
/// All multi-byte formats are native-endian. 24-bit samples travel in
/// 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    S8,
    S16Ne,
    S24Ne,
    S32Ne,
}

impl SampleFormat {
    /// Output format for a stream of the given bit depth.
    ///
    /// 8, 16 and 24 map to their own formats; anything else is carried as
    /// 32-bit.
    pub fn for_bits_per_sample(bits: u32) -> Self {
        match bits {
            8 => SampleFormat::S8,
            16 => SampleFormat::S16Ne,
            24 => SampleFormat::S24Ne,
            _ => SampleFormat::S32Ne,
        }
    }

    /// Bytes occupied by one sample in the output buffer.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S8 => 1,
            SampleFormat::S16Ne => 2,
            SampleFormat::S24Ne | SampleFormat::S32Ne => 4,
        }
    }
}

/// ReplayGain adjustment handed to the sink, already converted to dB and
/// linear peak values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayGainInfo {
    pub track_gain_db: f32,
    pub track_peak: f32,
    pub album_gain_db: f32,
    pub album_peak: f32,
}

/// Host audio output.
///
/// Called only from the decode thread. Write calls block while the device
/// buffer is full; that backpressure is what paces decoding.
pub trait AudioSink: PlatformSend {
    /// Configure the device for the stream about to play.
    fn open_audio(&mut self, format: SampleFormat, sample_rate: u32, channels: u16) -> Result<()>;

    /// Queue interleaved PCM bytes in the format passed to `open_audio`.
    fn write_audio(&mut self, data: &[u8]) -> Result<()>;

    /// Report the nominal bitrate in bits per second.
    fn set_bitrate(&mut self, _bitrate: u32) {}

    /// Report ReplayGain values for the upcoming stream.
    fn set_replay_gain(&mut self, _info: &ReplayGainInfo) {}

    /// Drop buffered audio; playback resumes at `position_ms`.
    fn flush(&mut self, _position_ms: u64) {}

    /// Pause or resume the device.
    fn pause(&mut self, _paused: bool) {}

    /// Whether queued audio is still being played out.
    fn buffer_playing(&self) -> bool {
        false
    }

    /// Release the device.
    fn close_audio(&mut self) {}
}

/// Unique identifier for a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_for_bit_depth() {
        assert_eq!(SampleFormat::for_bits_per_sample(8), SampleFormat::S8);
        assert_eq!(SampleFormat::for_bits_per_sample(16), SampleFormat::S16Ne);
        assert_eq!(SampleFormat::for_bits_per_sample(24), SampleFormat::S24Ne);
        assert_eq!(SampleFormat::for_bits_per_sample(32), SampleFormat::S32Ne);
        assert_eq!(SampleFormat::for_bits_per_sample(20), SampleFormat::S32Ne);
    }

    #[test]
    fn sample_format_widths() {
        assert_eq!(SampleFormat::S8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16Ne.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S24Ne.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::S32Ne.bytes_per_sample(), 4);
    }

    #[test]
    fn session_id_is_unique() {
        let a = PlaybackSessionId::new();
        let b = PlaybackSessionId::new();
        assert_ne!(a, b);
        assert_eq!(a, PlaybackSessionId::from_uuid(*a.as_uuid()));
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }
}
