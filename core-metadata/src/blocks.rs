//! # FLAC Metadata Blocks
//!
//! Block model, chain walker, and serializer.
//!
//! ## Overview
//!
//! A FLAC stream starts with the `fLaC` marker followed by metadata blocks,
//! each introduced by a 4-byte header:
//!
//! ```text
//! bit 7      last-metadata-block flag
//! bits 0..6  block type
//! 24 bits    payload length (big-endian)
//! ```
//!
//! STREAMINFO must come first. Audio frames follow the last block. Some
//! taggers prepend an ID3v2 tag, which is skipped.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use bridge_traits::stream_io::{ReadStatus, StreamIoBridge};

use crate::error::{MetadataError, Result};
use crate::vorbis_comment::VorbisComment;

pub const FLAC_MARKER: &[u8; 4] = b"fLaC";

/// Size of a STREAMINFO payload.
pub const STREAMINFO_LEN: usize = 34;

/// Largest payload a 24-bit length field can describe.
pub const MAX_BLOCK_LEN: usize = (1 << 24) - 1;

/// APIC/PICTURE type for the front cover.
pub const PICTURE_FRONT_COVER: u32 = 3;

const BLOCK_HEADER_LEN: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    Unknown(u8),
}

impl BlockType {
    pub fn from_code(code: u8) -> Self {
        match code & 0x7f {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::CueSheet,
            6 => BlockType::Picture,
            other => BlockType::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BlockType::StreamInfo => 0,
            BlockType::Padding => 1,
            BlockType::Application => 2,
            BlockType::SeekTable => 3,
            BlockType::VorbisComment => 4,
            BlockType::CueSheet => 5,
            BlockType::Picture => 6,
            BlockType::Unknown(code) => code & 0x7f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub is_last: bool,
    pub block_type: BlockType,
    pub length: u32,
}

impl BlockHeader {
    pub fn parse(raw: [u8; 4]) -> Self {
        Self {
            is_last: raw[0] & 0x80 != 0,
            block_type: BlockType::from_code(raw[0]),
            length: u32::from_be_bytes([0, raw[1], raw[2], raw[3]]),
        }
    }

    pub fn encode(&self) -> [u8; 4] {
        let len = self.length.to_be_bytes();
        let flag = if self.is_last { 0x80 } else { 0 };
        [flag | self.block_type.code(), len[1], len[2], len[3]]
    }
}

/// Stream-level audio properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u32,
    /// Samples per channel; 0 when unknown.
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != STREAMINFO_LEN {
            return Err(MetadataError::CorruptedBlock(format!(
                "STREAMINFO is {} bytes, expected {STREAMINFO_LEN}",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let min_block_size = cursor.read_u16::<BigEndian>()?;
        let max_block_size = cursor.read_u16::<BigEndian>()?;
        let min_frame_size = cursor.read_u24::<BigEndian>()?;
        let max_frame_size = cursor.read_u24::<BigEndian>()?;
        // 20 bits rate | 3 bits channels-1 | 5 bits bps-1 | 36 bits total samples
        let packed = cursor.read_u64::<BigEndian>()?;
        let mut md5 = [0u8; 16];
        cursor.read_exact(&mut md5)?;

        Ok(Self {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate: (packed >> 44) as u32,
            channels: ((packed >> 41) & 0x7) as u16 + 1,
            bits_per_sample: ((packed >> 36) & 0x1f) as u32 + 1,
            total_samples: packed & 0xf_ffff_ffff,
            md5,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STREAMINFO_LEN);
        let packed = (u64::from(self.sample_rate) & 0xf_ffff) << 44
            | (u64::from(self.channels.saturating_sub(1)) & 0x7) << 41
            | (u64::from(self.bits_per_sample.saturating_sub(1)) & 0x1f) << 36
            | (self.total_samples & 0xf_ffff_ffff);
        let _ = out.write_u16::<BigEndian>(self.min_block_size);
        let _ = out.write_u16::<BigEndian>(self.max_block_size);
        let _ = out.write_u24::<BigEndian>(self.min_frame_size & 0xff_ffff);
        let _ = out.write_u24::<BigEndian>(self.max_frame_size & 0xff_ffff);
        let _ = out.write_u64::<BigEndian>(packed);
        out.extend_from_slice(&self.md5);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    pub sample_number: u64,
    pub stream_offset: u64,
    pub frame_samples: u16,
}

impl SeekPoint {
    /// Sample number marking an unused placeholder point.
    pub const PLACEHOLDER: u64 = u64::MAX;
    pub const LEN: usize = 18;
}

fn parse_seek_table(data: &[u8]) -> Result<Vec<SeekPoint>> {
    if data.len() % SeekPoint::LEN != 0 {
        return Err(MetadataError::CorruptedBlock(format!(
            "SEEKTABLE length {} is not a multiple of {}",
            data.len(),
            SeekPoint::LEN
        )));
    }
    let mut cursor = Cursor::new(data);
    (0..data.len() / SeekPoint::LEN)
        .map(|_| {
            Ok(SeekPoint {
                sample_number: cursor.read_u64::<BigEndian>()?,
                stream_offset: cursor.read_u64::<BigEndian>()?,
                frame_samples: cursor.read_u16::<BigEndian>()?,
            })
        })
        .collect()
}

/// Embedded picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    pub picture_type: u32,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub colors: u32,
    pub data: Bytes,
}

impl Picture {
    pub fn is_front_cover(&self) -> bool {
        self.picture_type == PICTURE_FRONT_COVER
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let picture_type = cursor.read_u32::<BigEndian>()?;
        let mime_type = read_be_string(&mut cursor, data.len(), "picture MIME type")?;
        let description = read_be_string(&mut cursor, data.len(), "picture description")?;
        let width = cursor.read_u32::<BigEndian>()?;
        let height = cursor.read_u32::<BigEndian>()?;
        let depth = cursor.read_u32::<BigEndian>()?;
        let colors = cursor.read_u32::<BigEndian>()?;
        let data_len = cursor.read_u32::<BigEndian>()? as usize;
        let start = cursor.position() as usize;
        let end = start
            .checked_add(data_len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                MetadataError::CorruptedBlock(format!("picture data length {data_len} overruns block"))
            })?;

        Ok(Self {
            picture_type,
            mime_type,
            description,
            width,
            height,
            depth,
            colors,
            data: Bytes::copy_from_slice(&data[start..end]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.mime_type.len() + self.description.len() + self.data.len());
        let _ = out.write_u32::<BigEndian>(self.picture_type);
        let _ = out.write_u32::<BigEndian>(self.mime_type.len() as u32);
        out.extend_from_slice(self.mime_type.as_bytes());
        let _ = out.write_u32::<BigEndian>(self.description.len() as u32);
        out.extend_from_slice(self.description.as_bytes());
        for value in [self.width, self.height, self.depth, self.colors] {
            let _ = out.write_u32::<BigEndian>(value);
        }
        let _ = out.write_u32::<BigEndian>(self.data.len() as u32);
        out.extend_from_slice(&self.data);
        out
    }
}

fn read_be_string(cursor: &mut Cursor<&[u8]>, total: usize, what: &str) -> Result<String> {
    let len = cursor.read_u32::<BigEndian>()? as usize;
    let remaining = total.saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(MetadataError::CorruptedBlock(format!(
            "{what} length {len} exceeds remaining {remaining} bytes"
        )));
    }
    let mut raw = vec![0u8; len];
    cursor.read_exact(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// One parsed metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataBlock {
    StreamInfo(StreamInfo),
    /// Padding of the given payload length.
    Padding(u32),
    Application { id: [u8; 4], data: Bytes },
    SeekTable(Vec<SeekPoint>),
    VorbisComment(VorbisComment),
    /// CUESHEET payloads are carried through untouched.
    CueSheet(Bytes),
    Picture(Picture),
    /// Reserved block types, and known types whose payload failed to parse.
    Unknown { code: u8, data: Bytes },
}

impl MetadataBlock {
    pub fn block_type(&self) -> BlockType {
        match self {
            MetadataBlock::StreamInfo(_) => BlockType::StreamInfo,
            MetadataBlock::Padding(_) => BlockType::Padding,
            MetadataBlock::Application { .. } => BlockType::Application,
            MetadataBlock::SeekTable(_) => BlockType::SeekTable,
            MetadataBlock::VorbisComment(_) => BlockType::VorbisComment,
            MetadataBlock::CueSheet(_) => BlockType::CueSheet,
            MetadataBlock::Picture(_) => BlockType::Picture,
            MetadataBlock::Unknown { code, .. } => BlockType::from_code(*code),
        }
    }

    /// Decode a payload.
    ///
    /// Only a broken STREAMINFO is an error. Other blocks that fail to parse
    /// are kept verbatim as [`MetadataBlock::Unknown`].
    pub fn parse(block_type: BlockType, data: Vec<u8>) -> Result<Self> {
        let parsed = match block_type {
            BlockType::StreamInfo => return StreamInfo::parse(&data).map(MetadataBlock::StreamInfo),
            BlockType::Padding => Ok(MetadataBlock::Padding(data.len() as u32)),
            BlockType::Application if data.len() >= 4 => {
                let id = [data[0], data[1], data[2], data[3]];
                Ok(MetadataBlock::Application {
                    id,
                    data: Bytes::copy_from_slice(&data[4..]),
                })
            }
            BlockType::Application => Err(MetadataError::CorruptedBlock(
                "APPLICATION block shorter than its id".to_string(),
            )),
            BlockType::SeekTable => parse_seek_table(&data).map(MetadataBlock::SeekTable),
            BlockType::VorbisComment => VorbisComment::parse(&data).map(MetadataBlock::VorbisComment),
            BlockType::CueSheet => return Ok(MetadataBlock::CueSheet(Bytes::from(data))),
            BlockType::Picture => Picture::parse(&data).map(MetadataBlock::Picture),
            BlockType::Unknown(code) => {
                return Ok(MetadataBlock::Unknown {
                    code,
                    data: Bytes::from(data),
                })
            }
        };

        Ok(parsed.unwrap_or_else(|e| {
            warn!(?block_type, error = %e, "unparseable metadata block kept verbatim");
            MetadataBlock::Unknown {
                code: block_type.code(),
                data: Bytes::from(data),
            }
        }))
    }

    /// Serialize the payload (without header).
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            MetadataBlock::StreamInfo(info) => info.encode(),
            MetadataBlock::Padding(len) => vec![0u8; *len as usize],
            MetadataBlock::Application { id, data } => {
                let mut out = Vec::with_capacity(4 + data.len());
                out.extend_from_slice(id);
                out.extend_from_slice(data);
                out
            }
            MetadataBlock::SeekTable(points) => {
                let mut out = Vec::with_capacity(points.len() * SeekPoint::LEN);
                for point in points {
                    let _ = out.write_u64::<BigEndian>(point.sample_number);
                    let _ = out.write_u64::<BigEndian>(point.stream_offset);
                    let _ = out.write_u16::<BigEndian>(point.frame_samples);
                }
                out
            }
            MetadataBlock::VorbisComment(comment) => comment.encode(),
            MetadataBlock::CueSheet(data) => data.to_vec(),
            MetadataBlock::Picture(picture) => picture.encode(),
            MetadataBlock::Unknown { data, .. } => data.to_vec(),
        }
    }

    /// Append header and payload to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>, is_last: bool) -> Result<()> {
        let payload = self.encode_payload();
        if payload.len() > MAX_BLOCK_LEN {
            return Err(MetadataError::CorruptedBlock(format!(
                "{:?} payload of {} bytes exceeds the 24-bit length field",
                self.block_type(),
                payload.len()
            )));
        }
        let header = BlockHeader {
            is_last,
            block_type: self.block_type(),
            length: payload.len() as u32,
        };
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Header plus payload length.
    pub fn encoded_len(&self) -> u64 {
        let payload = match self {
            MetadataBlock::Padding(len) => *len as u64,
            other => other.encode_payload().len() as u64,
        };
        BLOCK_HEADER_LEN + payload
    }
}

/// Marker plus every block, with the last-block flag set on the final one.
pub fn encode_chain(blocks: &[MetadataBlock]) -> Result<Vec<u8>> {
    let mut out = FLAC_MARKER.to_vec();
    for (i, block) in blocks.iter().enumerate() {
        block.write_to(&mut out, i + 1 == blocks.len())?;
    }
    Ok(out)
}

/// Result of walking the metadata section of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChain {
    /// Offset of the `fLaC` marker (non-zero after an ID3v2 preamble).
    pub stream_start: u64,
    pub blocks: Vec<MetadataBlock>,
    /// Offset of the first audio frame.
    pub audio_offset: u64,
}

impl MetadataChain {
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.blocks.iter().find_map(|block| match block {
            MetadataBlock::StreamInfo(info) => Some(info),
            _ => None,
        })
    }

    pub fn vorbis_comment(&self) -> Option<&VorbisComment> {
        self.blocks.iter().find_map(|block| match block {
            MetadataBlock::VorbisComment(comment) => Some(comment),
            _ => None,
        })
    }

    pub fn has_seek_table(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, MetadataBlock::SeekTable(_)))
    }

    /// Bytes occupied by the marker and all blocks.
    pub fn metadata_len(&self) -> u64 {
        self.audio_offset - self.stream_start
    }
}

/// Fill `buf` completely from the bridge.
pub fn read_exact(bridge: &StreamIoBridge, buf: &mut [u8], what: &'static str) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match bridge.read(&mut buf[filled..]) {
            ReadStatus::Continue(n) => filled += n,
            ReadStatus::EndOfStream => return Err(MetadataError::Truncated(what)),
            ReadStatus::Abort => return Err(MetadataError::ReadAborted),
        }
    }
    Ok(())
}

/// Size of an ID3v2 tag from its 10-byte header, footer included.
fn id3v2_len(header: &[u8; 10]) -> u64 {
    let size = header[6..10]
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7f));
    let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

/// Walk the metadata section from the start of the stream.
///
/// `on_block` sees every block as soon as it is read. The walk stops after
/// the block flagged as last, leaving the bridge positioned at the first
/// audio frame. Any read quota on the bridge is lifted once the marker has
/// been recognised.
pub fn walk_metadata<F>(bridge: &StreamIoBridge, mut on_block: F) -> Result<MetadataChain>
where
    F: FnMut(&MetadataBlock),
{
    if let Err(e) = bridge.seek(0) {
        debug!(stream = bridge.name(), error = %e, "cannot rewind, assuming stream start");
    }

    let mut marker = [0u8; 4];
    read_exact(bridge, &mut marker, "stream marker").map_err(not_flac_on_truncation)?;
    let mut stream_start = 0u64;

    if &marker[..3] == b"ID3" {
        let mut header = [0u8; 10];
        header[..4].copy_from_slice(&marker);
        read_exact(bridge, &mut header[4..], "ID3v2 header").map_err(not_flac_on_truncation)?;
        stream_start = id3v2_len(&header);
        trace!(stream = bridge.name(), skip = stream_start, "skipping ID3v2 tag");
        bridge.seek(stream_start)?;
        read_exact(bridge, &mut marker, "stream marker").map_err(not_flac_on_truncation)?;
    }

    if &marker != FLAC_MARKER {
        return Err(MetadataError::NotFlac(format!(
            "expected fLaC marker, found {:02x?}",
            marker
        )));
    }
    bridge.clear_read_limit();

    let mut blocks = Vec::new();
    let mut offset = stream_start + FLAC_MARKER.len() as u64;
    loop {
        let mut raw = [0u8; 4];
        read_exact(bridge, &mut raw, "block header")?;
        let header = BlockHeader::parse(raw);

        if blocks.is_empty() && header.block_type != BlockType::StreamInfo {
            return Err(MetadataError::MissingStreamInfo);
        }

        let mut payload = vec![0u8; header.length as usize];
        read_exact(bridge, &mut payload, "block payload")?;
        offset += BLOCK_HEADER_LEN + u64::from(header.length);

        trace!(block_type = ?header.block_type, length = header.length, last = header.is_last, "metadata block");
        let block = MetadataBlock::parse(header.block_type, payload)?;
        on_block(&block);
        blocks.push(block);

        if header.is_last {
            break;
        }
    }

    Ok(MetadataChain {
        stream_start,
        blocks,
        audio_offset: offset,
    })
}

/// Walk the metadata section without a per-block callback.
pub fn read_metadata_chain(bridge: &StreamIoBridge) -> Result<MetadataChain> {
    walk_metadata(bridge, |_| {})
}

fn not_flac_on_truncation(err: MetadataError) -> MetadataError {
    match err {
        MetadataError::Truncated(what) => MetadataError::NotFlac(format!("stream too short for {what}")),
        other => other,
    }
}
