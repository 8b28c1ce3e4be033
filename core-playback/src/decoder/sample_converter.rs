//! # Sample Format Converter
//!
//! Packs decoded 32-bit samples into the byte layout handed to the sink.

use crate::error::{PlaybackError, Result};
use tracing::error;

/// Sample converter for the sink's wire format.
///
/// The decode loop keeps every sample in an `i32` regardless of the stream's
/// bit depth. Before a chunk goes to the sink it is narrowed here:
///
/// | Bits | Output per sample |
/// |------|-------------------|
/// | 8    | low byte |
/// | 16   | low 16 bits, native-endian |
/// | 24   | full 32-bit word, native-endian |
/// | 32   | full 32-bit word, native-endian |
///
/// 24-bit audio is not packed into 3 bytes; the sink reads it as
/// [`SampleFormat::S24Ne`](bridge_traits::SampleFormat::S24Ne) in a 32-bit
/// container.
pub struct SampleConverter;

impl SampleConverter {
    /// Narrow `src` to `bits` per sample, replacing the contents of `dst`.
    ///
    /// Returns the number of bytes written. Any bit depth other than 8, 16,
    /// 24 or 32 fails with [`PlaybackError::UnsupportedBitDepth`] and leaves
    /// `dst` untouched.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_playback::SampleConverter;
    ///
    /// let mut out = Vec::new();
    /// let written = SampleConverter::squeeze(&[1, -1], 16, &mut out).unwrap();
    /// assert_eq!(written, 4);
    /// ```
    pub fn squeeze(src: &[i32], bits: u32, dst: &mut Vec<u8>) -> Result<usize> {
        let width = Self::bytes_per_sample(bits).ok_or_else(|| {
            error!(bits, "no sample packing for bit depth");
            PlaybackError::UnsupportedBitDepth(bits)
        })?;

        dst.clear();
        dst.reserve(src.len() * width);
        match bits {
            8 => dst.extend(src.iter().map(|&s| s as u8)),
            16 => {
                for &s in src {
                    dst.extend_from_slice(&(s as i16).to_ne_bytes());
                }
            }
            _ => {
                for &s in src {
                    dst.extend_from_slice(&s.to_ne_bytes());
                }
            }
        }
        Ok(dst.len())
    }

    /// Output bytes per sample for `bits`, or `None` when unsupported.
    pub fn bytes_per_sample(bits: u32) -> Option<usize> {
        match bits {
            8 => Some(1),
            16 => Some(2),
            24 | 32 => Some(4),
            _ => None,
        }
    }

    /// Whether `bits` can be squeezed.
    pub fn is_supported(bits: u32) -> bool {
        Self::bytes_per_sample(bits).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squeeze_8_bit_keeps_low_byte() {
        let mut out = Vec::new();
        let n = SampleConverter::squeeze(&[0x7f, -1, 0x1234], 8, &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(out, vec![0x7f, 0xff, 0x34]);
    }

    #[test]
    fn test_squeeze_16_bit() {
        let mut out = Vec::new();
        SampleConverter::squeeze(&[-2, 0x0001_7fff], 16, &mut out).unwrap();
        let mut expected = (-2i16).to_ne_bytes().to_vec();
        expected.extend_from_slice(&0x7fffi16.to_ne_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_squeeze_24_bit_uses_32_bit_words() {
        let mut out = Vec::new();
        let n = SampleConverter::squeeze(&[-8_388_608, 8_388_607], 24, &mut out).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&out[..4], &(-8_388_608i32).to_ne_bytes());
        assert_eq!(&out[4..], &8_388_607i32.to_ne_bytes());
    }

    #[test]
    fn test_squeeze_32_bit_unmodified() {
        let mut out = Vec::new();
        SampleConverter::squeeze(&[i32::MIN], 32, &mut out).unwrap();
        assert_eq!(out, i32::MIN.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_unsupported_bit_depth_writes_nothing() {
        let mut out = vec![9u8; 3];
        let err = SampleConverter::squeeze(&[1, 2, 3], 20, &mut out).unwrap_err();
        assert!(matches!(err, PlaybackError::UnsupportedBitDepth(20)));
        assert_eq!(out, vec![9u8; 3]);
    }

    #[test]
    fn test_output_buffer_is_replaced() {
        let mut out = Vec::new();
        SampleConverter::squeeze(&[1, 2, 3, 4], 8, &mut out).unwrap();
        SampleConverter::squeeze(&[5], 8, &mut out).unwrap();
        assert_eq!(out, vec![5]);
    }
}
