//! ReplayGain tag parsing.
//!
//! Gain and peak tags are decimal strings (`"-3.20 dB"`, `"0.988"`). They are
//! kept as fixed-point `(value, divisor)` pairs so no precision is lost
//! between the tag text and the host.
//!
//! Track and album gain share one divisor slot, and track and album peak
//! share another. A value parsed with a different divisor than the slot
//! already holds is rescaled into the stored divisor.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use bridge_traits::playback::ReplayGainInfo;

/// Fixed-point decimal: `value / divisor`. `divisor` is a power of ten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainValue {
    pub value: i32,
    pub divisor: i32,
}

impl GainValue {
    pub const ZERO: GainValue = GainValue {
        value: 0,
        divisor: 1,
    };

    pub fn new(value: i32, divisor: i32) -> Self {
        Self { value, divisor }
    }

    pub fn as_f32(self) -> f32 {
        if self.divisor == 0 {
            return 0.0;
        }
        self.value as f32 / self.divisor as f32
    }

    fn decimals(self) -> Option<usize> {
        let mut d = self.divisor;
        let mut places = 0;
        while d > 1 && d % 10 == 0 {
            d /= 10;
            places += 1;
        }
        (d == 1).then_some(places)
    }
}

/// Formats with exactly as many decimals as the divisor carries, so
/// `parse_gain_text(s).to_string() == s` for canonical decimal strings.
/// A zero value has no sign: `"-0.00"` formats as `"0.00"`.
impl fmt::Display for GainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decimals() {
            Some(0) => write!(f, "{}", self.value),
            Some(places) => {
                let sign = if self.value < 0 { "-" } else { "" };
                let abs = self.value.unsigned_abs();
                let divisor = self.divisor.unsigned_abs();
                write!(
                    f,
                    "{sign}{}.{:0width$}",
                    abs / divisor,
                    abs % divisor,
                    width = places
                )
            }
            None => write!(f, "{}", self.as_f32()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayGainParseError {
    #[error("no digits in gain value {0:?}")]
    NoDigits(String),
}

/// Parse a decimal gain/peak string into a fixed-point value.
///
/// Accepts an optional leading `-`, integer digits, and an optional `.`
/// followed by fractional digits. Parsing stops at the first other
/// character, so unit suffixes like `" dB"` are ignored. Fractional digits
/// stop being consumed once another digit could overflow the value.
pub fn parse_gain_text(text: &str) -> Result<GainValue, ReplayGainParseError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let negative = bytes.first() == Some(&b'-');
    if negative {
        pos += 1;
    }

    let mut value: i32 = 0;
    let mut divisor: i32 = 1;
    let mut digits = 0;

    while let Some(d) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
        match value.checked_mul(10).and_then(|v| v.checked_add(i32::from(d - b'0'))) {
            Some(next) => value = next,
            None => break,
        }
        digits += 1;
        pos += 1;
    }

    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        while let Some(d) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
            if value >= i32::MAX / 10 || divisor >= 1_000_000_000 {
                break;
            }
            value = value * 10 + i32::from(d - b'0');
            divisor *= 10;
            digits += 1;
            pos += 1;
        }
    }

    if digits == 0 {
        return Err(ReplayGainParseError::NoDigits(text.to_string()));
    }

    Ok(GainValue {
        value: if negative { -value } else { value },
        divisor,
    })
}

/// Recognised `REPLAYGAIN_*` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainField {
    TrackGain,
    TrackPeak,
    AlbumGain,
    AlbumPeak,
    ReferenceLoudness,
}

impl GainField {
    pub fn from_key(key: &str) -> Option<Self> {
        const KEYS: [(&str, GainField); 5] = [
            ("REPLAYGAIN_TRACK_GAIN", GainField::TrackGain),
            ("REPLAYGAIN_TRACK_PEAK", GainField::TrackPeak),
            ("REPLAYGAIN_ALBUM_GAIN", GainField::AlbumGain),
            ("REPLAYGAIN_ALBUM_PEAK", GainField::AlbumPeak),
            ("REPLAYGAIN_REFERENCE_LOUDNESS", GainField::ReferenceLoudness),
        ];
        KEYS.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, field)| *field)
    }
}

/// ReplayGain values of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplayGain {
    track_gain: Option<i32>,
    album_gain: Option<i32>,
    track_peak: Option<i32>,
    album_peak: Option<i32>,
    gain_divisor: Option<i32>,
    peak_divisor: Option<i32>,
    reference_loudness: Option<GainValue>,
}

/// Express `value` (scaled by `divisor`) in the divisor already held by `slot`,
/// or claim the slot.
fn store_in_slot(slot: &mut Option<i32>, value: GainValue) -> i32 {
    match *slot {
        Some(stored) if stored != value.divisor && value.divisor != 0 => {
            let rescaled = i64::from(value.value) * i64::from(stored) / i64::from(value.divisor);
            rescaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
        }
        Some(_) => value.value,
        None => {
            *slot = Some(value.divisor);
            value.value
        }
    }
}

impl ReplayGain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: GainField, value: GainValue) {
        match field {
            GainField::TrackGain => {
                self.track_gain = Some(store_in_slot(&mut self.gain_divisor, value))
            }
            GainField::AlbumGain => {
                self.album_gain = Some(store_in_slot(&mut self.gain_divisor, value))
            }
            GainField::TrackPeak => {
                self.track_peak = Some(store_in_slot(&mut self.peak_divisor, value))
            }
            GainField::AlbumPeak => {
                self.album_peak = Some(store_in_slot(&mut self.peak_divisor, value))
            }
            GainField::ReferenceLoudness => self.reference_loudness = Some(value),
        }
    }

    /// Parse `text` and store it. Unparseable text stores zero.
    pub fn set_text(&mut self, field: GainField, text: &str) {
        let value = parse_gain_text(text).unwrap_or_else(|e| {
            debug!(?field, error = %e, "treating ReplayGain value as zero");
            GainValue::ZERO
        });
        self.set(field, value);
    }

    fn gain(&self, value: Option<i32>) -> Option<GainValue> {
        Some(GainValue::new(value?, self.gain_divisor?))
    }

    fn peak(&self, value: Option<i32>) -> Option<GainValue> {
        Some(GainValue::new(value?, self.peak_divisor?))
    }

    pub fn track_gain(&self) -> Option<GainValue> {
        self.gain(self.track_gain)
    }

    pub fn album_gain(&self) -> Option<GainValue> {
        self.gain(self.album_gain)
    }

    pub fn track_peak(&self) -> Option<GainValue> {
        self.peak(self.track_peak)
    }

    pub fn album_peak(&self) -> Option<GainValue> {
        self.peak(self.album_peak)
    }

    pub fn reference_loudness(&self) -> Option<GainValue> {
        self.reference_loudness
    }

    pub fn gain_divisor(&self) -> Option<i32> {
        self.gain_divisor
    }

    pub fn peak_divisor(&self) -> Option<i32> {
        self.peak_divisor
    }

    /// Host-facing dB/linear values. Missing entries become 0.
    pub fn to_info(&self) -> ReplayGainInfo {
        let f = |v: Option<GainValue>| v.map(GainValue::as_f32).unwrap_or(0.0);
        ReplayGainInfo {
            track_gain_db: f(self.track_gain()),
            track_peak: f(self.track_peak()),
            album_gain_db: f(self.album_gain()),
            album_peak: f(self.album_peak()),
        }
    }
}
