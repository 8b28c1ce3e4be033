//! VORBIS_COMMENT rewriting.
//!
//! Replaces the text tags of a FLAC stream with the values from a
//! [`TrackMetadata`]. Entries the player does not manage (ReplayGain,
//! MusicBrainz ids, encoder info) are carried over unchanged.
//!
//! When the new metadata fits into the space the old metadata occupied, the
//! difference is absorbed by a single trailing PADDING block and only the
//! metadata region is rewritten. Otherwise the whole stream is rewritten and
//! truncated to its new length.

use tracing::{debug, info, instrument};

use bridge_traits::stream_io::{ReadStatus, StreamIoBridge};

use crate::blocks::{read_metadata_chain, BlockType, MetadataBlock, MetadataChain, MAX_BLOCK_LEN};
use crate::error::{MetadataError, Result};
use crate::extractor::TrackMetadata;
use crate::vorbis_comment::{split_comment, VorbisComment, DEFAULT_VENDOR};

/// Padding added after a full rewrite so later edits can stay in place.
pub const DEFAULT_PADDING: u32 = 4096;

/// Keys owned by the writer; existing entries with these keys are replaced.
const MANAGED_KEYS: [&str; 8] = [
    "TITLE",
    "ARTIST",
    "ALBUM",
    "ALBUMARTIST",
    "GENRE",
    "COMMENT",
    "DATE",
    "TRACKNUMBER",
];

/// How a write was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Only the metadata region was overwritten.
    InPlace,
    /// Metadata and audio were rewritten and the stream truncated.
    Rewritten,
}

#[derive(Debug, Clone, Default)]
pub struct TagWriter {
    padding: Option<u32>,
}

impl TagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Padding to reserve when a full rewrite is needed.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Rewrite the tags of `stream`.
    #[instrument(skip(self, stream, metadata), fields(stream = stream.name()))]
    pub fn write(&self, stream: &StreamIoBridge, metadata: &TrackMetadata) -> Result<WriteMode> {
        let chain = read_metadata_chain(stream)?;
        let comment = build_comment(chain.vorbis_comment(), metadata);
        let blocks = replace_comment(&chain, comment);

        let body_len: u64 = blocks.iter().map(MetadataBlock::encoded_len).sum::<u64>() + 4;
        let old_len = chain.metadata_len();

        let mode = if let Some(padded) = fit_padding(body_len, old_len) {
            let mut blocks = blocks;
            if let Some(padding) = padded {
                blocks.push(MetadataBlock::Padding(padding));
            }
            self.write_in_place(stream, &chain, &blocks)?;
            WriteMode::InPlace
        } else {
            let mut blocks = blocks;
            blocks.push(MetadataBlock::Padding(self.padding.unwrap_or(DEFAULT_PADDING)));
            self.rewrite(stream, &chain, &blocks)?;
            WriteMode::Rewritten
        };

        info!(?mode, old_len, new_len = body_len, "tags written");
        Ok(mode)
    }

    fn write_in_place(
        &self,
        stream: &StreamIoBridge,
        chain: &MetadataChain,
        blocks: &[MetadataBlock],
    ) -> Result<()> {
        let encoded = crate::blocks::encode_chain(blocks)?;
        debug_assert_eq!(encoded.len() as u64, chain.metadata_len());
        stream
            .seek(chain.stream_start)
            .and_then(|_| stream.write_all(&encoded))
            .map_err(|e| MetadataError::WriteFailed(format!("in-place metadata write: {e}")))
    }

    fn rewrite(&self, stream: &StreamIoBridge, chain: &MetadataChain, blocks: &[MetadataBlock]) -> Result<()> {
        let audio = read_to_end(stream, chain.audio_offset)?;
        let encoded = crate::blocks::encode_chain(blocks)?;
        debug!(metadata = encoded.len(), audio = audio.len(), "rewriting whole stream");

        let end = chain.stream_start + encoded.len() as u64 + audio.len() as u64;
        stream
            .seek(chain.stream_start)
            .and_then(|_| stream.write_all(&encoded))
            .and_then(|_| stream.write_all(&audio))
            .and_then(|_| stream.truncate(end))
            .map_err(|e| MetadataError::WriteFailed(format!("stream rewrite: {e}")))
    }
}

/// `Some(None)` when the body fills the old region exactly, `Some(Some(n))`
/// when an `n`-byte padding block closes the gap, `None` when it does not fit.
fn fit_padding(body_len: u64, old_len: u64) -> Option<Option<u32>> {
    if body_len == old_len {
        return Some(None);
    }
    let gap = old_len.checked_sub(body_len)?.checked_sub(4)?;
    if gap > MAX_BLOCK_LEN as u64 {
        return None;
    }
    Some(Some(gap as u32))
}

fn build_comment(existing: Option<&VorbisComment>, metadata: &TrackMetadata) -> VorbisComment {
    let mut comment = VorbisComment::new(
        existing
            .map(|c| c.vendor.clone())
            .unwrap_or_else(|| DEFAULT_VENDOR.to_string()),
    );

    if let Some(existing) = existing {
        comment.comments.extend(
            existing
                .comments
                .iter()
                .filter(|entry| match split_comment(entry) {
                    Some((key, _)) => !MANAGED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)),
                    None => true,
                })
                .cloned(),
        );
    }

    let text_fields = [
        ("TITLE", &metadata.title),
        ("ARTIST", &metadata.artist),
        ("ALBUM", &metadata.album),
        ("ALBUMARTIST", &metadata.album_artist),
        ("GENRE", &metadata.genre),
        ("COMMENT", &metadata.comment),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            comment.push(key, value);
        }
    }
    if let Some(year) = metadata.year.filter(|y| *y > 0) {
        comment.push("DATE", &year.to_string());
    }
    if let Some(track) = metadata.track_number.filter(|t| *t > 0) {
        comment.push("TRACKNUMBER", &track.to_string());
    }
    comment
}

/// Blocks in file order with the first comment block replaced (or appended)
/// and every PADDING block dropped.
///
/// A comment block that failed to parse counts as the comment block; any
/// further comment blocks are dropped so the result holds exactly one.
fn replace_comment(chain: &MetadataChain, comment: VorbisComment) -> Vec<MetadataBlock> {
    let mut comment = Some(comment);
    let mut blocks = Vec::with_capacity(chain.blocks.len() + 1);
    for block in &chain.blocks {
        match block.block_type() {
            BlockType::Padding => {}
            BlockType::VorbisComment => {
                if let Some(replacement) = comment.take() {
                    blocks.push(MetadataBlock::VorbisComment(replacement));
                }
            }
            _ => blocks.push(block.clone()),
        }
    }
    if let Some(comment) = comment {
        blocks.push(MetadataBlock::VorbisComment(comment));
    }
    blocks
}

fn read_to_end(stream: &StreamIoBridge, from: u64) -> Result<Vec<u8>> {
    stream
        .seek(from)
        .map_err(|e| MetadataError::WriteFailed(format!("seek to audio data: {e}")))?;
    let mut out = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match stream.read(&mut chunk) {
            ReadStatus::Continue(n) => out.extend_from_slice(&chunk[..n]),
            ReadStatus::EndOfStream => return Ok(out),
            ReadStatus::Abort => {
                return Err(MetadataError::WriteFailed(
                    "read aborted while buffering audio data".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_padding() {
        assert_eq!(fit_padding(100, 100), Some(None));
        assert_eq!(fit_padding(100, 104), Some(Some(0)));
        assert_eq!(fit_padding(100, 150), Some(Some(46)));
        assert_eq!(fit_padding(100, 102), None);
        assert_eq!(fit_padding(200, 100), None);
    }

    #[test]
    fn test_build_comment_keeps_unmanaged_entries() {
        let mut existing = VorbisComment::new("reference libFLAC 1.3.2");
        existing.push("TITLE", "Old");
        existing.push("REPLAYGAIN_TRACK_GAIN", "-3.20 dB");
        existing.push("tracknumber", "9");

        let metadata = TrackMetadata {
            title: Some("New".to_string()),
            track_number: Some(4),
            year: Some(0),
            ..TrackMetadata::default()
        };

        let comment = build_comment(Some(&existing), &metadata);
        assert_eq!(comment.vendor, "reference libFLAC 1.3.2");
        assert_eq!(
            comment.comments,
            vec![
                "REPLAYGAIN_TRACK_GAIN=-3.20 dB".to_string(),
                "TITLE=New".to_string(),
                "TRACKNUMBER=4".to_string(),
            ]
        );
    }

    #[test]
    fn test_build_comment_without_existing_block() {
        let metadata = TrackMetadata {
            artist: Some("Someone".to_string()),
            year: Some(1999),
            ..TrackMetadata::default()
        };
        let comment = build_comment(None, &metadata);
        assert_eq!(comment.vendor, DEFAULT_VENDOR);
        assert_eq!(comment.get("ARTIST"), Some("Someone"));
        assert_eq!(comment.get("DATE"), Some("1999"));
    }
}
