//! VORBIS_COMMENT block payload.
//!
//! Layout (all lengths little-endian, unlike the rest of FLAC metadata):
//! `vendor_len:u32 vendor[vendor_len] count:u32 { len:u32 entry[len] }*`.
//! Each entry is a `KEY=VALUE` string; keys are case-insensitive ASCII.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::{MetadataError, Result};

/// Vendor string used when a new comment block has to be created.
pub const DEFAULT_VENDOR: &str = "core-metadata";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VorbisComment {
    pub vendor: String,
    /// Raw `KEY=VALUE` entries in file order.
    pub comments: Vec<String>,
}

impl VorbisComment {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            comments: Vec::new(),
        }
    }

    /// Parse a block payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let vendor = read_string(&mut cursor, data.len(), "vendor string")?;
        let count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| MetadataError::CorruptedBlock("comment count missing".to_string()))?;

        // Every entry needs at least its 4-byte length prefix.
        let remaining = data.len().saturating_sub(cursor.position() as usize);
        if count as usize > remaining / 4 {
            return Err(MetadataError::CorruptedBlock(format!(
                "comment count {count} exceeds block size"
            )));
        }

        let mut comments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            comments.push(read_string(&mut cursor, data.len(), "comment entry")?);
        }

        Ok(Self { vendor, comments })
    }

    /// Serialize back into a block payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            8 + self.vendor.len() + self.comments.iter().map(|c| c.len() + 4).sum::<usize>(),
        );
        write_string(&mut out, &self.vendor);
        // Vec<u8> writes cannot fail.
        let _ = out.write_u32::<LittleEndian>(self.comments.len() as u32);
        for comment in &self.comments {
            write_string(&mut out, comment);
        }
        out
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.comments.push(format!("{key}={value}"));
    }

    /// Well-formed `(key, value)` pairs in file order. Malformed entries are
    /// skipped.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.comments.iter().filter_map(|entry| {
            let pair = split_comment(entry);
            if pair.is_none() {
                debug!(entry = %entry, "skipping malformed comment entry");
            }
            pair
        })
    }

    /// First value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

fn read_string(cursor: &mut Cursor<&[u8]>, total: usize, what: &str) -> Result<String> {
    let len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| MetadataError::CorruptedBlock(format!("{what} length missing")))?
        as usize;
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

fn write_string(out: &mut Vec<u8>, value: &str) {
    let _ = out.write_u32::<LittleEndian>(value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

/// Split a `KEY=VALUE` entry at the first `=`.
///
/// Returns `None` when there is no `=`, the key is empty, or the key holds
/// characters outside printable ASCII.
pub fn split_comment(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    if key.is_empty() || !key.bytes().all(|b| (0x20..=0x7d).contains(&b)) {
        return None;
    }
    Some((key, value))
}

/// Integer parse that reads only the leading run of digits.
///
/// `"2003-05-01"` yields 2003 and `"3/12"` yields 3. Values without leading
/// digits, zero, and values that do not fit in a `u32` yield `None`.
pub fn parse_leading_int(value: &str) -> Option<u32> {
    let trimmed = value.trim_start();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    match trimmed[..digits_end].parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
