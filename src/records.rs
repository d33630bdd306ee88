//! D300-D304 track-point record decoding into the uniform [`TrackPoint`] type.

use num_enum::TryFromPrimitive;

use crate::constants::{GARMIN_TIME_OFFSET, INVALID_ALTITUDE, INVALID_SEMICIRCLE};
use crate::error::CapabilityError;

/// A position in Garmin semicircles. Degrees = value * 180 / 2^31.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub lat: i32,
    pub lon: i32,
}

impl Position {
    pub const INVALID: Position = Position {
        lat: INVALID_SEMICIRCLE,
        lon: INVALID_SEMICIRCLE,
    };

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }
}

/// Whether a track point carries a trusted altitude fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// 3D fix; altitude trusted.
    Fix3D,
    /// 2D fix or none; altitude absent or not trusted.
    Fix2D,
}

impl Validity {
    pub fn as_char(self) -> char {
        match self {
            Validity::Fix3D => 'A',
            Validity::Fix2D => 'V',
        }
    }
}

/// A decoded track point, uniform across all D300-D304 source formats.
#[derive(Debug, Clone, Copy)]
pub struct TrackPoint {
    /// Seconds since the POSIX epoch (device time already adjusted by
    /// [`GARMIN_TIME_OFFSET`]).
    pub time: i64,
    pub posn: Position,
    pub alt: f32,
    pub validity: Validity,
}

impl TrackPoint {
    pub fn is_valid_fix(&self) -> bool {
        !self.posn.is_invalid() && self.alt != INVALID_ALTITUDE
    }
}

fn garmin_time(raw: u32) -> i64 {
    raw as i64 + GARMIN_TIME_OFFSET
}

fn read_i32_le(b: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn read_u32_le(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn read_f32_le(b: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn read_posn(b: &[u8]) -> Position {
    Position {
        lat: read_i32_le(b, 0),
        lon: read_i32_le(b, 4),
    }
}

/// The track-point data-protocol id resolved by the capability scanner (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum TrackPointFormat {
    D300 = 300,
    D301 = 301,
    D302 = 302,
    D303 = 303,
    D304 = 304,
}

impl TrackPointFormat {
    pub fn from_data_id(id: u16) -> Option<Self> {
        Self::try_from(id).ok()
    }

    /// Minimum payload length this format requires.
    fn min_len(self) -> usize {
        match self {
            Self::D300 => 13,  // posn(8) + time(4) + new_trk(1)
            Self::D301 => 21,  // + alt(4) + dpth(4)
            Self::D302 => 25,  // + temp(4)
            Self::D303 => 17,  // posn(8) + time(4) + alt(4) + heart_rate(1)
            Self::D304 => 23,  // + distance(4) + heart_rate(1) + cadence(1) + sensor(1)
        }
    }

    /// Decodes one record payload of this format into a uniform track point.
    pub fn decode(self, data: &[u8], device: &str) -> Result<TrackPoint, CapabilityError> {
        if data.len() < self.min_len() {
            return Err(CapabilityError::Unsupported {
                device: device.to_string(),
            });
        }

        let posn = read_posn(data);
        let time = garmin_time(read_u32_le(data, 8));

        match self {
            Self::D300 => Ok(TrackPoint {
                time,
                posn,
                alt: 0.0,
                validity: Validity::Fix2D,
            }),
            Self::D301 | Self::D302 => Ok(TrackPoint {
                time,
                posn,
                alt: read_f32_le(data, 12),
                validity: Validity::Fix3D,
            }),
            Self::D303 | Self::D304 => Ok(TrackPoint {
                time,
                posn,
                alt: read_f32_le(data, 12),
                validity: Validity::Fix3D,
            }),
        }
    }
}
