// SPDX-License-Identifier: GPL-2.0-or-later

use crate::BoxType;
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Fixed-point 16.16 representation of 1.0.
pub const FIXED_16_16_ONE: i32 = 0x0001_0000;

// Fixed-point 2.30 representation of 1.0.
pub const FIXED_2_30_ONE: i32 = 0x4000_0000;

// 3x3 transformation matrix in row order.
// Columns one and two are 16.16 fixed point, column three is 2.30.
pub type Matrix = [i32; 9];

pub const IDENTITY_MATRIX: Matrix = [
    FIXED_16_16_ONE, 0, 0, //
    0, FIXED_16_16_ONE, 0, //
    0, 0, FIXED_2_30_ONE,
];

// Seconds between 1904-01-01 and 1970-01-01.
pub const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

// Converts Unix seconds to seconds since the 1904 epoch used by mvhd, tkhd and mdhd.
#[must_use]
pub fn mp4_time_from_unix(secs: u64) -> u64 {
    secs.saturating_add(MP4_EPOCH_OFFSET)
}

// Converts `value` from the `from` timescale to the `to` timescale,
// rounding half up. A zero `from` timescale yields zero.
#[must_use]
pub fn rescale(value: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    let from = u128::from(from);
    let scaled = (u128::from(value) * u128::from(to) + from / 2) / from;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Clockwise display rotation of a video track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid rotation: {0} degrees, expected 0, 90, 180 or 270")]
pub struct InvalidRotationError(pub u16);

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotationError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(InvalidRotationError(degrees)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        match value {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl Rotation {
    // Display matrix for the rotation, [cos, sin, 0, -sin, cos, 0, 0, 0, 1].
    #[must_use]
    pub const fn matrix(self) -> Matrix {
        const ONE: i32 = FIXED_16_16_ONE;
        const W: i32 = FIXED_2_30_ONE;
        match self {
            Self::Deg0 => IDENTITY_MATRIX,
            Self::Deg90 => [0, ONE, 0, -ONE, 0, 0, 0, 0, W],
            Self::Deg180 => [-ONE, 0, 0, 0, -ONE, 0, 0, 0, W],
            Self::Deg270 => [0, -ONE, 0, ONE, 0, 0, 0, 0, W],
        }
    }
}

// Field encoders used to build box contents.
pub trait BufMutExt: BufMut {
    fn put_fourcc(&mut self, v: BoxType) {
        self.put_slice(&v);
    }

    fn put_u24(&mut self, v: u32) {
        self.put_uint(u64::from(v), 3);
    }

    fn put_zeros(&mut self, n: usize) {
        self.put_bytes(0, n);
    }

    // Integer as 16.16 fixed point. Bits above 16 are lost.
    fn put_fixed_16_16(&mut self, v: u32) {
        self.put_u32(v << 16);
    }

    // Integer as 8.8 fixed point.
    fn put_fixed_8_8(&mut self, v: u8) {
        self.put_u16(u16::from(v) << 8);
    }

    fn put_matrix(&mut self, m: &Matrix) {
        for v in m {
            self.put_i32(*v);
        }
    }

    // Entry count of a table. Saturates, in-memory tables never exceed u32.
    fn put_count(&mut self, len: usize) {
        self.put_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }
}

impl<B: BufMut + ?Sized> BufMutExt for B {}
