//! # FLAC Metadata Module
//!
//! Reads and writes the metadata section of FLAC streams.
//!
//! ## Overview
//!
//! This module handles:
//! - Metadata block parsing and serialization ([`blocks`])
//! - VORBIS_COMMENT entries ([`vorbis_comment`])
//! - ReplayGain fixed-point parsing ([`replay_gain`])
//! - Mapping blocks onto a host-facing [`TrackMetadata`] ([`extractor`])
//! - Rewriting text tags in place or by full rewrite ([`tag_writer`])
//!
//! All I/O goes through [`StreamIoBridge`](bridge_traits::StreamIoBridge), so
//! the same code serves local files, memory buffers, and network streams.

pub mod blocks;
pub mod error;
pub mod extractor;
pub mod replay_gain;
pub mod tag_writer;
pub mod vorbis_comment;

pub use blocks::{MetadataBlock, MetadataChain, Picture, StreamInfo};
pub use error::{MetadataError, Result};
pub use extractor::{MetadataExtractor, TrackMetadata};
pub use replay_gain::{parse_gain_text, GainField, GainValue, ReplayGain, ReplayGainParseError};
pub use tag_writer::{TagWriter, WriteMode};
pub use vorbis_comment::VorbisComment;
