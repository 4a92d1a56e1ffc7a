mod half;
mod iq4nl;
mod mxfp4;
mod q2_k;
mod q3_k;
mod q4_0;
mod q4_1;
mod q4_k;
mod q5_0;
mod q5_1;
mod q5_k;
mod q6_k;
mod q8_0;
mod q8_k;

use crate::{fp16::half_to_float, Fields};

pub use iq4nl::{IQ4NL, IQ4NL_VALUES};
pub use mxfp4::MXFP4;
pub use q2_k::Q2K;
pub use q3_k::Q3K;
pub use q4_0::Q4_0;
pub use q4_1::Q4_1;
pub use q4_k::Q4K;
pub use q5_0::Q5_0;
pub use q5_1::Q5_1;
pub use q5_k::Q5K;
pub use q6_k::Q6K;
pub use q8_0::Q8_0;
pub use q8_k::Q8K;

/// A binary16 scale followed by a binary16 minimum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DeltaMin {
    pub delta: u16,
    pub min: u16,
}

impl DeltaMin {
    pub const ZERO: Self = Self { delta: 0, min: 0 };

    #[inline]
    fn read(fields: &mut Fields) -> Option<Self> {
        Some(Self {
            delta: fields.u16()?,
            min: fields.u16()?,
        })
    }

    #[inline]
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend_from_slice(&self.min.to_le_bytes());
    }

    #[inline]
    pub fn to_f32(self) -> (f32, f32) {
        (half_to_float(self.delta), half_to_float(self.min))
    }
}

/// Size of the packed scale array of [`Q3K`], [`Q4K`] and [`Q5K`].
const K_SCALE_SIZE: usize = 12;

/// Extracts the 6-bit scale and 6-bit min of sub-block `j` in `0..8`
/// from the packing shared by [`Q4K`] and [`Q5K`].
///
/// Bytes `0..4` hold scales `0..4` and bytes `4..8` hold mins `0..4` in their low 6 bits.
/// Sub-blocks `4..8` keep their low nibbles in bytes `8..12`
/// and borrow the top 2 bits of bytes `0..8` as bits 4 and 5.
#[inline]
fn scale_min_k4(j: usize, q: &[u8; K_SCALE_SIZE]) -> (u8, u8) {
    if j < 4 {
        (q[j] & 63, q[j + 4] & 63)
    } else {
        let scale = (q[j + 4] & 0xf) | ((q[j - 4] >> 6) << 4);
        let min = (q[j + 4] >> 4) | ((q[j] >> 6) << 4);
        (scale, min)
    }
}

#[test]
fn test_scale_min_k4() {
    use crate::test_utils::pack_scale_min_k4;

    #[rustfmt::skip]
    let q = [
        0b11_000001, 0b01_000010, 0b00_111111, 0b10_000100,
        0b00_000101, 0b11_000110, 0b10_000111, 0b01_001000,
        0x21, 0x43, 0x65, 0x87,
    ];
    assert_eq!(scale_min_k4(0, &q), (1, 5));
    assert_eq!(scale_min_k4(2, &q), (63, 7));
    assert_eq!(scale_min_k4(4, &q), (0x31, 0x02));
    assert_eq!(scale_min_k4(5, &q), (0x13, 0x34));
    assert_eq!(scale_min_k4(6, &q), (0x05, 0x26));
    assert_eq!(scale_min_k4(7, &q), (0x27, 0x18));

    let scales = [0, 63, 17, 42, 5, 60, 33, 48];
    let mins = [63, 0, 21, 9, 50, 1, 32, 15];
    let q = pack_scale_min_k4(scales, mins);
    for j in 0..8 {
        assert_eq!(scale_min_k4(j, &q), (scales[j], mins[j]));
    }
}
