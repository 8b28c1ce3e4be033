//! Workspace facade crate.
//!
//! Exposes the FLAC decode and metadata crates behind feature flags so host
//! applications can depend on a single crate:
//!
//! - `logging`: [`core_runtime`] tracing setup
//! - `metadata`: [`core_metadata`] tag reading, ReplayGain, tag rewriting
//! - `playback` (default): [`core_playback`] decode loop and play controller

pub use bridge_traits;

#[cfg(feature = "logging")]
pub use core_runtime;

#[cfg(feature = "metadata")]
pub use core_metadata;

#[cfg(feature = "playback")]
pub use core_playback;
