//! Channel count and sample rate from a raw FLAC frame header.
//!
//! Symphonia reports the stream's signal spec for every decoded buffer, so
//! the per-frame values are read back from the packet bytes.
//!
//! ```text
//! byte 0-1  sync 0xFFF8 | blocking strategy
//! byte 2    block size code (4) | sample rate code (4)
//! byte 3    channel assignment (4) | sample size (3) | reserved (1)
//! byte 4..  coded frame/sample number (1-7 bytes, UTF-8 style)
//! then      8/16-bit block size, 8/16-bit sample rate (per codes)
//! ```

/// Format fields of one frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub channels: u16,
    /// `None` when the header defers to STREAMINFO.
    pub sample_rate: Option<u32>,
}

impl FrameHeader {
    /// Parse the header at the start of `buf`, or `None` if it is not one.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 5 || buf[0] != 0xFF || buf[1] & 0xFE != 0xF8 {
            return None;
        }

        let block_code = buf[2] >> 4;
        let rate_code = buf[2] & 0x0F;
        let channels = match buf[3] >> 4 {
            n @ 0..=7 => u16::from(n) + 1,
            8..=10 => 2,
            _ => return None,
        };

        let number_len = match buf[4].leading_ones() {
            0 => 1,
            n @ 2..=7 => n as usize,
            _ => return None,
        };
        let mut pos = 4 + number_len;
        pos += match block_code {
            6 => 1,
            7 => 2,
            _ => 0,
        };

        let sample_rate = match rate_code {
            0 => None,
            1 => Some(88_200),
            2 => Some(176_400),
            3 => Some(192_000),
            4 => Some(8_000),
            5 => Some(16_000),
            6 => Some(22_050),
            7 => Some(24_000),
            8 => Some(32_000),
            9 => Some(44_100),
            10 => Some(48_000),
            11 => Some(96_000),
            12 => Some(u32::from(*buf.get(pos)?) * 1000),
            13 => Some(u32::from(read_u16(buf, pos)?)),
            14 => Some(u32::from(read_u16(buf, pos)?) * 10),
            _ => return None,
        };

        Some(Self {
            channels,
            sample_rate,
        })
    }
}

fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*buf.get(pos)?, *buf.get(pos + 1)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_cd_header() {
        let header = FrameHeader::parse(&[0xFF, 0xF8, 0x69, 0x18, 0x00, 0x0F, 0x00]).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, Some(44_100));
    }

    #[test]
    fn test_rate_and_channel_codes() {
        let header = FrameHeader::parse(&[0xFF, 0xF8, 0x6A, 0x08, 0x01, 0x0F]).unwrap();
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, Some(48_000));

        // mid/side stereo, rate from STREAMINFO
        let header = FrameHeader::parse(&[0xFF, 0xF9, 0x60, 0xA8, 0x00, 0x0F]).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, None);
    }

    #[test]
    fn test_trailing_rate_fields() {
        // 8-bit block size, then rate in kHz after a two-byte coded number
        let header = FrameHeader::parse(&[0xFF, 0xF8, 0x6C, 0x18, 0xC2, 0x80, 0x0F, 0x30]).unwrap();
        assert_eq!(header.sample_rate, Some(48_000));

        // rate in Hz, 16-bit
        let header = FrameHeader::parse(&[0xFF, 0xF8, 0x0D, 0x18, 0x00, 0x1F, 0x40]).unwrap();
        assert_eq!(header.sample_rate, Some(8_000));

        // rate in tens of Hz, truncated
        assert!(FrameHeader::parse(&[0xFF, 0xF8, 0x0E, 0x18, 0x00, 0x11]).is_none());
    }

    #[test]
    fn test_rejects_non_headers() {
        assert!(FrameHeader::parse(&[0xFF, 0xF8, 0x69]).is_none());
        assert!(FrameHeader::parse(&[0x66, 0x4C, 0x61, 0x43, 0x00]).is_none());
        // reserved channel assignment
        assert!(FrameHeader::parse(&[0xFF, 0xF8, 0x69, 0xB8, 0x00]).is_none());
        // invalid coded number lead byte
        assert!(FrameHeader::parse(&[0xFF, 0xF8, 0x69, 0x18, 0x80]).is_none());
    }
}
