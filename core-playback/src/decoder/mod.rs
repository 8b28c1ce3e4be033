//! # Audio Decoder Module
//!
//! The frame decode engine and the sample packing applied to its output.
//!
//! ## Architecture
//!
//! The engine is pull-based and callback-driven. Input comes from a
//! [`StreamIoBridge`](bridge_traits::StreamIoBridge); output goes to a
//! [`DecoderClient`]:
//!
//! ```text
//! StreamIoBridge → DecodeEngine → DecoderClient::write → OutputBuffer → SampleConverter → AudioSink
//! ```
//!
//! [`SymphoniaEngine`] (feature `symphonia-engine`, on by default) is the
//! production engine. Anything implementing [`DecodeEngine`] can stand in
//! for it, which is how the decode loop is tested without real audio.
//!
//! ## Threading Model
//!
//! Engines are `Send` and driven by exactly one thread at a time.

pub mod engine;
pub mod sample_converter;

#[cfg(feature = "symphonia-engine")]
mod frame_header;
#[cfg(feature = "symphonia-engine")]
mod symphonia;

pub use engine::{
    DecodeEngine, DecodeErrorStatus, DecodedFrame, DecoderClient, EngineState, WriteStatus,
};
pub use sample_converter::SampleConverter;

#[cfg(feature = "symphonia-engine")]
pub use self::symphonia::SymphoniaEngine;
