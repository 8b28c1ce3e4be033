//! # Decoder Configuration
//!
//! Limits and pacing for the FLAC decode loop and the play loop around it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Decode loop configuration.
///
/// Controls output buffer sizing, the probe read quota, error tolerance, and
/// the polling intervals of the play loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Largest block size (samples per channel) a frame may carry.
    ///
    /// Default: 65535, the FLAC format limit.
    #[serde(default = "default_max_block_size")]
    pub max_block_size: usize,

    /// Largest channel count a stream may have.
    ///
    /// Default: 8, the FLAC format limit.
    #[serde(default = "default_max_channels")]
    pub max_channels: u16,

    /// Number of samples (all channels) converted and handed to the sink per
    /// write.
    ///
    /// Default: 8192.
    #[serde(default = "default_output_block_size")]
    pub output_block_size: usize,

    /// Bytes that may be read while looking for the `fLaC` marker.
    ///
    /// Default: 8 KB.
    #[serde(default = "default_probe_read_limit")]
    pub probe_read_limit: u64,

    /// Decoder error callbacks tolerated in a row before the session fails.
    ///
    /// Default: 10.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// How often the play loop checks whether the sink has drained.
    ///
    /// Default: 40ms.
    #[serde(default = "default_drain_poll_interval")]
    pub drain_poll_interval: Duration,

    /// Longest a paused play loop sleeps before re-checking the transport.
    ///
    /// Default: 50ms.
    #[serde(default = "default_pause_poll_interval")]
    pub pause_poll_interval: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_block_size: default_max_block_size(),
            max_channels: default_max_channels(),
            output_block_size: default_output_block_size(),
            probe_read_limit: default_probe_read_limit(),
            max_consecutive_errors: default_max_consecutive_errors(),
            drain_poll_interval: default_drain_poll_interval(),
            pause_poll_interval: default_pause_poll_interval(),
        }
    }
}

impl DecoderConfig {
    /// Configuration for hosts whose output only handles stereo.
    ///
    /// - At most 2 channels
    /// - Output buffer sized for stereo only
    pub fn stereo_only() -> Self {
        Self {
            max_channels: 2,
            ..Default::default()
        }
    }

    /// Parse a JSON configuration, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::Config(format!("invalid decoder config: {e}")))?;
        config.validate().map_err(PlaybackError::Config)?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_block_size == 0 {
            return Err("max_block_size must be > 0".to_string());
        }

        if self.max_channels == 0 {
            return Err("max_channels must be > 0".to_string());
        }

        if self.output_block_size == 0 {
            return Err("output_block_size must be > 0".to_string());
        }

        if self.probe_read_limit < 4 {
            return Err("probe_read_limit must cover the 4-byte stream marker".to_string());
        }

        if self.drain_poll_interval.is_zero() || self.pause_poll_interval.is_zero() {
            return Err("poll intervals must be non-zero".to_string());
        }

        Ok(())
    }

    /// Output buffer capacity in samples: every channel of the largest block.
    pub fn buffer_capacity(&self) -> usize {
        self.max_block_size * self.max_channels as usize
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_block_size() -> usize {
    65535
}

fn default_max_channels() -> u16 {
    8
}

fn default_output_block_size() -> usize {
    8192
}

fn default_probe_read_limit() -> u64 {
    8192
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_drain_poll_interval() -> Duration {
    Duration::from_millis(40)
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(50)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_capacity(), 65535 * 8);
        assert_eq!(config.drain_poll_interval, Duration::from_millis(40));
    }

    #[test]
    fn test_stereo_only() {
        let config = DecoderConfig::stereo_only();
        assert_eq!(config.max_channels, 2);
        assert_eq!(config.buffer_capacity(), 65535 * 2);
    }

    #[test]
    fn test_validation() {
        let config = DecoderConfig {
            output_block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DecoderConfig {
            probe_read_limit: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = DecoderConfig::from_json(r#"{ "max_channels": 2, "output_block_size": 4096 }"#)
            .unwrap();
        assert_eq!(config.max_channels, 2);
        assert_eq!(config.output_block_size, 4096);
        assert_eq!(config.max_block_size, 65535);

        assert!(matches!(
            DecoderConfig::from_json(r#"{ "max_channels": 0 }"#),
            Err(PlaybackError::Config(_))
        ));
        assert!(DecoderConfig::from_json("not json").is_err());
    }
}
