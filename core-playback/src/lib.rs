//! # Playback Module
//!
//! FLAC decoding and the per-track play loop.
//!
//! ## Overview
//!
//! This module handles:
//! - The decode engine contract and a Symphonia-backed FLAC engine
//!   (optional, feature `symphonia-engine`)
//! - The frame decode loop with its session and fixed-capacity output buffer
//! - Packing 32-bit samples into the sink's wire format
//! - Cross-thread stop/seek/pause signaling
//! - Driving a host [`AudioSink`](bridge_traits::AudioSink) for one track

pub mod config;
pub mod decode_loop;
pub mod decoder;
pub mod error;
pub mod player;
pub mod session;
pub mod transport;

pub use config::DecoderConfig;
pub use decode_loop::{sample_for_ms, DecodeStatus, FrameDecodeLoop, ProbeResult};
pub use decoder::{
    DecodeEngine, DecodeErrorStatus, DecodedFrame, DecoderClient, EngineState, SampleConverter,
    WriteStatus,
};
pub use error::{PlaybackError, Result};
pub use player::{PlaybackController, PlaybackOutcome};
pub use session::{DecodeSession, OutputBuffer, SessionState, StreamFormat};
pub use transport::TransportCell;

#[cfg(feature = "symphonia-engine")]
pub use decoder::SymphoniaEngine;
