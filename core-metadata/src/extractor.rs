//! FLAC Tag Extraction
//!
//! Turns the metadata blocks of a FLAC stream into a [`TrackMetadata`]
//! record: text tags, track number and year, length, average bitrate,
//! ReplayGain, and the front cover picture.
//!
//! ## Overview
//!
//! - STREAMINFO drives `length_ms` and `bitrate`
//! - VORBIS_COMMENT entries fill the text fields; repeated ARTIST/TITLE/...
//!   entries are joined with `", "`
//! - TRACKNUMBER and DATE keep only their leading digits
//! - `REPLAYGAIN_*` entries go through [`ReplayGain`]
//! - The first PICTURE of type front cover is kept
//!
//! Malformed entries are skipped and never fail the extraction.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::{FileStream, StreamIoBridge};
//! use core_metadata::extractor::MetadataExtractor;
//!
//! let stream = StreamIoBridge::from_handle(FileStream::open("song.flac")?, "song.flac");
//! let metadata = MetadataExtractor::new().extract(&stream)?;
//! println!("{} - {}", metadata.artist.unwrap_or_default(), metadata.title.unwrap_or_default());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use bridge_traits::stream::StreamSize;
use bridge_traits::stream_io::StreamIoBridge;

use crate::blocks::{walk_metadata, MetadataBlock, Picture, StreamInfo};
use crate::error::Result;
use crate::replay_gain::{GainField, ReplayGain};
use crate::vorbis_comment::parse_leading_int;

pub const FLAC_CODEC_NAME: &str = "Free Lossless Audio Codec (FLAC)";
pub const FLAC_QUALITY: &str = "lossless";

/// Metadata surfaced to the host for one FLAC stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<u32>,
    /// Length in milliseconds, or -1 when the sample rate is unknown.
    pub length_ms: i64,
    /// Average bitrate in kbps; 0 when the stream size or sample count is
    /// unknown.
    pub bitrate: u32,
    pub codec: String,
    pub quality: String,
    /// Present once any `REPLAYGAIN_*` entry was seen.
    pub replay_gain: Option<ReplayGain>,
    pub picture: Option<Picture>,
    pub stream_info: Option<StreamInfo>,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            title: None,
            artist: None,
            album: None,
            album_artist: None,
            genre: None,
            comment: None,
            track_number: None,
            year: None,
            length_ms: -1,
            bitrate: 0,
            codec: FLAC_CODEC_NAME.to_string(),
            quality: FLAC_QUALITY.to_string(),
            replay_gain: None,
            picture: None,
            stream_info: None,
        }
    }
}

impl TrackMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(&self) -> Option<Duration> {
        u64::try_from(self.length_ms).ok().map(Duration::from_millis)
    }
}

/// Track length in milliseconds, truncated to whole seconds first.
pub fn length_ms(info: &StreamInfo) -> i64 {
    if info.sample_rate == 0 {
        return -1;
    }
    (info.total_samples / u64::from(info.sample_rate)) as i64 * 1000
}

/// Average bitrate in kbps, rounded to nearest.
pub fn bitrate_kbps(info: &StreamInfo, size: StreamSize) -> u32 {
    let Some(bytes) = size.known() else {
        return 0;
    };
    if info.total_samples == 0 {
        return 0;
    }
    let bits_per_second =
        8 * u128::from(bytes) * u128::from(info.sample_rate) / u128::from(info.total_samples);
    u32::try_from((bits_per_second + 500) / 1000).unwrap_or(u32::MAX)
}

fn append_text(field: &mut Option<String>, value: &str) {
    match field {
        Some(existing) => {
            existing.push_str(", ");
            existing.push_str(value);
        }
        None => *field = Some(value.to_string()),
    }
}

/// FLAC metadata extractor
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Walk the metadata section of `stream` and build a [`TrackMetadata`].
    #[instrument(skip(self, stream), fields(stream = stream.name()))]
    pub fn extract(&self, stream: &StreamIoBridge) -> Result<TrackMetadata> {
        let size = stream.length();
        let mut metadata = TrackMetadata::new();
        let chain = walk_metadata(stream, |block| self.apply_block(&mut metadata, block, size))?;
        debug!(
            blocks = chain.blocks.len(),
            length_ms = metadata.length_ms,
            bitrate = metadata.bitrate,
            "metadata extracted"
        );
        Ok(metadata)
    }

    /// Fold one block into `metadata`.
    pub fn apply_block(&self, metadata: &mut TrackMetadata, block: &MetadataBlock, size: StreamSize) {
        match block {
            MetadataBlock::StreamInfo(info) => self.apply_stream_info(metadata, info, size),
            MetadataBlock::VorbisComment(comment) => {
                for (key, value) in comment.fields() {
                    self.apply_comment(metadata, key, value);
                }
            }
            MetadataBlock::Picture(picture) => {
                if metadata.picture.is_none() && picture.is_front_cover() {
                    metadata.picture = Some(picture.clone());
                }
            }
            _ => {}
        }
    }

    pub fn apply_stream_info(&self, metadata: &mut TrackMetadata, info: &StreamInfo, size: StreamSize) {
        metadata.length_ms = length_ms(info);
        metadata.bitrate = bitrate_kbps(info, size);
        metadata.stream_info = Some(*info);
    }

    /// Apply one `KEY=VALUE` entry. Unrecognised keys are ignored.
    pub fn apply_comment(&self, metadata: &mut TrackMetadata, key: &str, value: &str) {
        let upper = key.to_ascii_uppercase();
        match upper.as_str() {
            "TITLE" => append_text(&mut metadata.title, value),
            "ARTIST" => append_text(&mut metadata.artist, value),
            "ALBUM" => append_text(&mut metadata.album, value),
            "ALBUMARTIST" => append_text(&mut metadata.album_artist, value),
            "GENRE" => append_text(&mut metadata.genre, value),
            "COMMENT" => append_text(&mut metadata.comment, value),
            "TRACKNUMBER" => match parse_leading_int(value) {
                Some(n) => metadata.track_number = Some(n),
                None => debug!(value, "ignoring non-numeric TRACKNUMBER"),
            },
            "DATE" => match parse_leading_int(value) {
                Some(n) => metadata.year = Some(n),
                None => debug!(value, "ignoring non-numeric DATE"),
            },
            other => {
                if let Some(field) = GainField::from_key(other) {
                    metadata
                        .replay_gain
                        .get_or_insert_with(ReplayGain::new)
                        .set_text(field, value);
                }
            }
        }
    }
}
