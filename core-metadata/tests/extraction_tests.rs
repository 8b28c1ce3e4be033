//! Extraction over synthesised FLAC streams.

use bridge_traits::stream::MemoryStream;
use bridge_traits::stream_io::StreamIoBridge;
use bytes::Bytes;
use core_metadata::blocks::{encode_chain, MetadataBlock, Picture, SeekPoint, StreamInfo};
use core_metadata::extractor::{MetadataExtractor, FLAC_CODEC_NAME};
use core_metadata::replay_gain::GainValue;
use core_metadata::vorbis_comment::VorbisComment;
use core_metadata::MetadataError;

fn stream_info(sample_rate: u32, total_samples: u64) -> StreamInfo {
    StreamInfo {
        min_block_size: 4096,
        max_block_size: 4096,
        sample_rate,
        channels: 2,
        bits_per_sample: 16,
        total_samples,
        ..Default::default()
    }
}

fn picture(picture_type: u32, marker: u8) -> Picture {
    Picture {
        picture_type,
        mime_type: "image/jpeg".to_string(),
        description: String::new(),
        width: 600,
        height: 600,
        depth: 24,
        colors: 0,
        data: Bytes::from(vec![marker; 64]),
    }
}

/// Metadata followed by zeroed "audio" up to `file_size` bytes.
fn flac_file(blocks: &[MetadataBlock], file_size: usize) -> Vec<u8> {
    let mut data = encode_chain(blocks).unwrap();
    assert!(data.len() <= file_size);
    data.resize(file_size, 0);
    data
}

fn tagged_blocks() -> Vec<MetadataBlock> {
    let mut comment = VorbisComment::new("reference libFLAC 1.4.3");
    comment.push("ARTIST", "A");
    comment.push("ARTIST", "B");
    comment.push("TITLE", "Song");
    comment.push("ALBUM", "Record");
    comment.push("ALBUMARTIST", "Various");
    comment.push("GENRE", "Jazz");
    comment.push("COMMENT", "live");
    comment.push("DATE", "2003-05-01");
    comment.push("TRACKNUMBER", "3/12");
    comment.push("REPLAYGAIN_TRACK_GAIN", "-3.20 dB");
    comment.push("REPLAYGAIN_TRACK_PEAK", "0.988");
    comment.comments.push("BROKEN".to_string());

    vec![
        MetadataBlock::StreamInfo(stream_info(44_100, 441_000)),
        MetadataBlock::SeekTable(vec![SeekPoint {
            sample_number: 0,
            stream_offset: 0,
            frame_samples: 4096,
        }]),
        MetadataBlock::VorbisComment(comment),
        MetadataBlock::Picture(picture(4, 0xbb)),
        MetadataBlock::Picture(picture(3, 0xff)),
        MetadataBlock::Picture(picture(3, 0x11)),
        MetadataBlock::Padding(128),
    ]
}

#[test]
fn test_full_extraction() {
    let data = flac_file(&tagged_blocks(), 1_000_000);
    let stream = StreamIoBridge::from_handle(MemoryStream::new(data), "tagged.flac");

    let meta = MetadataExtractor::new().extract(&stream).unwrap();

    assert_eq!(meta.length_ms, 10_000);
    assert_eq!(meta.bitrate, 800);
    assert_eq!(meta.artist.as_deref(), Some("A, B"));
    assert_eq!(meta.title.as_deref(), Some("Song"));
    assert_eq!(meta.album.as_deref(), Some("Record"));
    assert_eq!(meta.album_artist.as_deref(), Some("Various"));
    assert_eq!(meta.genre.as_deref(), Some("Jazz"));
    assert_eq!(meta.comment.as_deref(), Some("live"));
    assert_eq!(meta.year, Some(2003));
    assert_eq!(meta.track_number, Some(3));
    assert_eq!(meta.codec, FLAC_CODEC_NAME);
    assert_eq!(meta.quality, "lossless");

    let rg = meta.replay_gain.expect("replay gain present");
    assert_eq!(rg.track_gain(), Some(GainValue::new(-320, 100)));
    assert_eq!(rg.track_peak(), Some(GainValue::new(988, 1000)));
    assert_eq!(rg.album_gain(), None);

    let cover = meta.picture.expect("front cover");
    assert_eq!(cover.picture_type, 3);
    assert_eq!(cover.data[0], 0xff);
}

#[test]
fn test_extraction_is_idempotent() {
    let data = flac_file(&tagged_blocks(), 50_000);
    let stream = StreamIoBridge::from_handle(MemoryStream::new(data), "again.flac");
    let extractor = MetadataExtractor::new();

    let first = extractor.extract(&stream).unwrap();
    let second = extractor.extract(&stream).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_size_and_rate() {
    let blocks = vec![MetadataBlock::StreamInfo(stream_info(0, 441_000))];
    let data = flac_file(&blocks, 4096);
    let stream = StreamIoBridge::from_handle(MemoryStream::new(data).with_unknown_size(), "radio");

    let meta = MetadataExtractor::new().extract(&stream).unwrap();
    assert_eq!(meta.length_ms, -1);
    assert_eq!(meta.bitrate, 0);
    assert!(meta.replay_gain.is_none());
    assert!(meta.picture.is_none());
    assert!(meta.title.is_none());
}

#[test]
fn test_not_flac() {
    let stream = StreamIoBridge::from_handle(MemoryStream::new(b"OggS\0\0\0\0".to_vec()), "x.ogg");
    let err = MetadataExtractor::new().extract(&stream).unwrap_err();
    assert!(matches!(err, MetadataError::NotFlac(_)));
}

#[test]
fn test_metadata_serializes_to_json() {
    let data = flac_file(&tagged_blocks(), 10_000);
    let stream = StreamIoBridge::from_handle(MemoryStream::new(data), "json.flac");
    let meta = MetadataExtractor::new().extract(&stream).unwrap();

    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["title"], "Song");
    assert_eq!(json["track_number"], 3);
    assert_eq!(json["length_ms"], 10_000);
}
