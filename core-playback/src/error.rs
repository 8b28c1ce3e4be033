//! # Playback Error Types
//!
//! Error types for FLAC decoding and the per-track play loop.

use thiserror::Error;

use bridge_traits::error::BridgeError;
use core_metadata::error::MetadataError;

/// Errors that can occur while decoding or playing a stream.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Failed to read from the audio source.
    #[error("Failed to read audio source: {0}")]
    SourceError(String),

    /// Seeking the source or the decoder failed.
    #[error("Seek failed: {0}")]
    SeekFailed(String),

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// Stream is not FLAC or its metadata cannot be used.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Output bit depth has no sample packing.
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    /// Channel count exceeds the configured maximum.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// A frame disagreed with the format established by STREAMINFO.
    #[error(
        "Frame format mismatch: stream is {expected_channels}ch/{expected_rate}Hz, frame is {channels}ch/{sample_rate}Hz"
    )]
    FormatMismatch {
        expected_channels: u16,
        expected_rate: u32,
        channels: u16,
        sample_rate: u32,
    },

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Decoder rejected the stream or failed repeatedly.
    #[error("Decoder error: {0}")]
    DecoderError(String),

    /// A decoded frame does not fit into the output buffer.
    #[error("Output buffer overflow: {needed} samples needed, {available} free")]
    BufferOverflow { needed: usize, available: usize },

    /// Operation is not valid in the current session state.
    #[error("Invalid decoder state: {0}")]
    InvalidState(String),

    /// Decoding was aborted from a write callback.
    #[error("Decoding aborted: {0}")]
    Aborted(String),

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// The host audio sink failed.
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Configuration values are invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the session is unusable after this error.
    ///
    /// Format mismatches and overflows reject only the offending frame and
    /// leave buffered samples intact; the engine recovers after a flush or
    /// seek.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PlaybackError::FormatMismatch { .. } | PlaybackError::BufferOverflow { .. }
        )
    }

    /// Returns `true` if the host stream failed.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Io(_)
                | PlaybackError::SourceError(_)
                | PlaybackError::SeekFailed(_)
                | PlaybackError::Bridge(_)
                | PlaybackError::Metadata(MetadataError::ReadAborted)
        )
    }

    /// Returns `true` if this error is about the stream's format.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::UnsupportedBitDepth(_)
                | PlaybackError::UnsupportedChannels(_)
                | PlaybackError::FormatMismatch { .. }
                | PlaybackError::Metadata(MetadataError::NotFlac(_))
                | PlaybackError::Metadata(MetadataError::MissingStreamInfo)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let mismatch = PlaybackError::FormatMismatch {
            expected_channels: 2,
            expected_rate: 44_100,
            channels: 1,
            sample_rate: 44_100,
        };
        assert!(!mismatch.is_fatal());
        assert!(mismatch.is_format_error());

        assert!(PlaybackError::UnsupportedBitDepth(20).is_fatal());
        assert!(PlaybackError::UnsupportedBitDepth(20).is_format_error());

        let io = PlaybackError::Metadata(MetadataError::ReadAborted);
        assert!(io.is_io_error());
        assert!(!io.is_format_error());
    }

    #[test]
    fn test_mismatch_message() {
        let err = PlaybackError::FormatMismatch {
            expected_channels: 2,
            expected_rate: 44_100,
            channels: 2,
            sample_rate: 48_000,
        };
        assert_eq!(
            err.to_string(),
            "Frame format mismatch: stream is 2ch/44100Hz, frame is 2ch/48000Hz"
        );
    }
}
