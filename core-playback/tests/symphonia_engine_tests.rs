//! End-to-end decoding of small hand-built FLAC streams through Symphonia.

#![cfg(feature = "symphonia-engine")]

use bridge_traits::stream::MemoryStream;
use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::blocks::encode_chain;
use core_metadata::{MetadataBlock, StreamInfo, VorbisComment};
use core_playback::{DecodeStatus, DecoderConfig, FrameDecodeLoop, SessionState};

const BLOCK: usize = 16;

fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
        crc
    })
}

fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |mut crc, &byte| {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
        crc
    })
}

/// One fixed-blocksize stereo frame of 16 samples with CONSTANT subframes.
fn constant_frame(number: u8, left: i16, right: i16) -> Vec<u8> {
    // 16-sample block (8-bit size follows), 44.1 kHz, stereo, 16-bit
    frame_with_codes(number, 0x69, 0x18, &[left, right])
}

/// Frame with explicit block size/rate and channel/sample size bytes, one
/// CONSTANT subframe per value.
fn frame_with_codes(number: u8, size_rate: u8, layout: u8, values: &[i16]) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xF8, size_rate, layout, number, (BLOCK - 1) as u8];
    frame.push(crc8(&frame));
    for &value in values {
        frame.push(0x00);
        frame.extend_from_slice(&value.to_be_bytes());
    }
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

fn flac_bytes() -> Vec<u8> {
    flac_with_frames(&[constant_frame(0, 1000, -1000), constant_frame(1, 1000, -1000)])
}

fn flac_with_frames(frames: &[Vec<u8>]) -> Vec<u8> {
    let info = StreamInfo {
        min_block_size: BLOCK as u16,
        max_block_size: BLOCK as u16,
        min_frame_size: 12,
        max_frame_size: 15,
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
        total_samples: (frames.len() * BLOCK) as u64,
        ..Default::default()
    };
    let mut comment = VorbisComment::new("test vendor");
    comment.push("TITLE", "Constant");
    comment.push("ARTIST", "Tester");

    let mut data = encode_chain(&[
        MetadataBlock::StreamInfo(info),
        MetadataBlock::VorbisComment(comment),
    ])
    .unwrap();
    for frame in frames {
        data.extend_from_slice(frame);
    }
    data
}

fn open(data: Vec<u8>) -> FrameDecodeLoop<core_playback::SymphoniaEngine> {
    let mut decoder = FrameDecodeLoop::new(DecoderConfig::default()).unwrap();
    decoder
        .read_metadata(StreamIoBridge::from_handle(MemoryStream::new(data), "constant.flac"))
        .unwrap();
    decoder
}

fn decode_all(decoder: &mut FrameDecodeLoop<core_playback::SymphoniaEngine>) -> usize {
    let mut frames = 0;
    loop {
        match decoder.decode_frame().unwrap() {
            DecodeStatus::Frame(n) => {
                assert_eq!(n, BLOCK);
                frames += 1;
            }
            DecodeStatus::Skipped => {}
            DecodeStatus::EndOfStream => return frames,
        }
    }
}

fn collect_statuses(decoder: &mut FrameDecodeLoop<core_playback::SymphoniaEngine>) -> Vec<DecodeStatus> {
    let mut statuses = Vec::new();
    loop {
        let status = decoder.decode_frame().unwrap();
        statuses.push(status);
        if status == DecodeStatus::EndOfStream {
            return statuses;
        }
    }
}

#[test]
fn test_frame_constants_match_known_layout() {
    assert_eq!(constant_frame(0, 1000, -1000).len(), 15);
    assert_eq!(&constant_frame(0, 1000, -1000)[7..13], &[0x00, 0x03, 0xE8, 0x00, 0xFC, 0x18]);
}

#[test]
fn test_decodes_constant_stream() {
    let mut decoder = open(flac_bytes());

    let metadata = decoder.metadata();
    assert_eq!(metadata.title.as_deref(), Some("Constant"));
    assert_eq!(metadata.artist.as_deref(), Some("Tester"));
    assert_eq!(decoder.session().format().bits_per_sample, 16);

    assert_eq!(decode_all(&mut decoder), 2);
    assert_eq!(decoder.session().state(), SessionState::EndOfStream);
    assert_eq!(decoder.session().samples_decoded(), 2 * BLOCK as u64);

    let output = decoder.output();
    assert_eq!(output.len(), 2 * 2 * BLOCK);
    for pair in output.chunks(2) {
        assert_eq!(pair, &[1000, -1000]);
    }
}

#[test]
fn test_decodes_after_id3v2_preamble() {
    let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    data.extend(flac_bytes());

    let mut decoder = open(data);
    assert_eq!(decoder.metadata().title.as_deref(), Some("Constant"));
    assert_eq!(decode_all(&mut decoder), 2);
    assert_eq!(&decoder.output()[..2], &[1000, -1000]);
}

#[test]
fn test_probe_accepts_stream() {
    let mut decoder = FrameDecodeLoop::new(DecoderConfig::default()).unwrap();
    let probe = decoder
        .probe(StreamIoBridge::from_handle(MemoryStream::new(flac_bytes()), "probe.flac"))
        .unwrap();

    assert_eq!(probe.format.channels, 2);
    assert_eq!(probe.format.sample_rate, 44_100);
    assert_eq!(probe.format.total_samples, 2 * BLOCK as u64);
    assert!(!probe.has_seek_table);
}

#[test]
fn test_rejects_non_flac() {
    let mut decoder = FrameDecodeLoop::new(DecoderConfig::default()).unwrap();
    let err = decoder
        .read_metadata(StreamIoBridge::from_handle(
            MemoryStream::new(b"OggS\x00\x02 not flac".to_vec()),
            "track.ogg",
        ))
        .unwrap_err();

    assert!(err.is_format_error());
    assert_eq!(decoder.session().state(), SessionState::Error);
}

#[test]
fn test_mid_stream_rate_change_reported() {
    let frames = [
        constant_frame(0, 1000, -1000),
        // same layout at 48 kHz
        frame_with_codes(1, 0x6A, 0x18, &[500, -500]),
        constant_frame(2, 2000, -2000),
    ];
    let mut decoder = open(flac_with_frames(&frames));

    let statuses = collect_statuses(&mut decoder);
    let decoded: Vec<_> = statuses
        .iter()
        .filter(|s| matches!(s, DecodeStatus::Frame(_)))
        .collect();
    assert_eq!(decoded, vec![&DecodeStatus::Frame(BLOCK), &DecodeStatus::Frame(BLOCK)]);
    assert!(statuses.contains(&DecodeStatus::Skipped));
    assert_eq!(statuses.last(), Some(&DecodeStatus::EndOfStream));

    // nothing from the 48 kHz frame reaches the output
    let output = decoder.output();
    assert_eq!(output.len(), 2 * 2 * BLOCK);
    assert_eq!(&output[..2], &[1000, -1000]);
    assert_eq!(&output[output.len() - 2..], &[2000, -2000]);
    assert!(!output.contains(&500));
}

#[test]
fn test_mid_stream_channel_change_reported() {
    let frames = [
        constant_frame(0, 1000, -1000),
        // mono frame in a stereo stream
        frame_with_codes(1, 0x69, 0x08, &[700]),
        constant_frame(2, 2000, -2000),
    ];
    let mut decoder = open(flac_with_frames(&frames));

    let statuses = collect_statuses(&mut decoder);
    assert!(statuses.contains(&DecodeStatus::Skipped));
    assert_eq!(statuses.last(), Some(&DecodeStatus::EndOfStream));
    assert!(!decoder.output().contains(&700));
    assert_eq!(decoder.session().state(), SessionState::EndOfStream);
}

#[test]
fn test_seek_lands_inside_frame() {
    let frames: Vec<_> = (0..4u8)
        .map(|n| {
            let level = 100 * (i16::from(n) + 1);
            constant_frame(n, level, -level)
        })
        .collect();
    let mut decoder = open(flac_with_frames(&frames));

    // 1 ms at 44.1 kHz is sample 44, 12 samples into the third frame
    assert_eq!(decoder.seek_to(1).unwrap(), 44);
    assert_eq!(decoder.session().state(), SessionState::Ready);
    assert_eq!(decoder.decode_frame().unwrap(), DecodeStatus::Frame(4));
    assert_eq!(decoder.output().len(), 8);
    assert_eq!(&decoder.output()[..2], &[300, -300]);

    let rest = collect_statuses(&mut decoder);
    assert_eq!(rest, vec![DecodeStatus::Frame(BLOCK), DecodeStatus::EndOfStream]);
    assert_eq!(&decoder.output()[8..10], &[400, -400]);
}

#[test]
fn test_seek_back_to_start_decodes_everything() {
    let mut decoder = open(flac_bytes());
    assert_eq!(decode_all(&mut decoder), 2);

    assert_eq!(decoder.seek_to(0).unwrap(), 0);
    assert!(decoder.output().is_empty());
    let statuses = collect_statuses(&mut decoder);
    assert!(!statuses.contains(&DecodeStatus::Skipped));
    assert_eq!(statuses.len(), 3);
}
