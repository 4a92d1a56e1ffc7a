use super::{scale_min_k4, DeltaMin, K_SCALE_SIZE};
use crate::{DataBlock, Dequantize, Fields, _256};

/// [`Q4K`](super::Q4K) with a 5th bit per element.
///
/// Bit `2j` of `qh[l]` extends element `l` of the low-nibble half of 64-element group `j`,
/// bit `2j + 1` extends element `l` of the high-nibble half.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q5K {
    pub delta_min: DeltaMin,
    pub scales: [u8; K_SCALE_SIZE],
    pub qh: [u8; _256 / 8],
    pub qs: [u8; _256 / 2],
}

impl DataBlock for Q5K {
    const COUNT: usize = _256;
    const SIZE: usize = 4 + K_SCALE_SIZE + _256 / 8 + _256 / 2;
    const ZEROS: Self = Self {
        delta_min: DeltaMin::ZERO,
        scales: [0; K_SCALE_SIZE],
        qh: [0; _256 / 8],
        qs: [0; _256 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta_min: DeltaMin::read(&mut fields)?,
            scales: fields.bytes()?,
            qh: fields.bytes()?,
            qs: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        self.delta_min.write(buf);
        buf.extend_from_slice(&self.scales);
        buf.extend_from_slice(&self.qh);
        buf.extend_from_slice(&self.qs);
    }
}

impl Dequantize<f32, _256> for Q5K {
    fn dequantize(&self) -> [f32; _256] {
        let (delta, min) = self.delta_min.to_f32();
        let high = |qh: u8, mask: u8| if qh & mask != 0 { 16 } else { 0 };

        let mut ans = [0.; _256];
        for (j, (ql, y)) in self.qs.chunks_exact(32).zip(ans.chunks_exact_mut(64)).enumerate() {
            let (sc, m) = scale_min_k4(2 * j, &self.scales);
            let (d1, m1) = (delta * sc as f32, min * m as f32);
            let (sc, m) = scale_min_k4(2 * j + 1, &self.scales);
            let (d2, m2) = (delta * sc as f32, min * m as f32);
            let (u1, u2) = (1 << (2 * j), 2 << (2 * j));

            let (l, h) = y.split_at_mut(32);
            for (i, (&ql, &qh)) in ql.iter().zip(&self.qh).enumerate() {
                l[i] = d1 * ((ql & 0xf) + high(qh, u1)) as f32 - m1;
                h[i] = d2 * ((ql >> 4) + high(qh, u2)) as f32 - m2;
            }
        }
        ans
    }
}

#[test]
fn test_q5_k_high_bits() {
    let mut blk = Q5K {
        delta_min: DeltaMin {
            delta: 0x3c00,
            min: 0x3c00,
        },
        // scales 1 and mins 1 for all 8 sub-blocks
        scales: [1, 1, 1, 1, 1, 1, 1, 1, 0x11, 0x11, 0x11, 0x11],
        qh: [0; _256 / 8],
        qs: [0x00; _256 / 2],
    };
    assert_eq!(<Q5K as Dequantize<f32, _256>>::dequantize(&blk), [-1.; _256]);

    // raise the 5th bit of sub-block 5 only: group 2, high-nibble half
    blk.qh = [1 << 5; _256 / 8];
    let ans = <Q5K as Dequantize<f32, _256>>::dequantize(&blk);
    for (i, &y) in ans.iter().enumerate() {
        let expected = if i / 32 == 5 { 15. } else { -1. };
        assert_eq!(y, expected, "element {i}");
    }
}

#[test]
fn test_q5_k_reference() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q5K>(8) {
        blk.delta_min = DeltaMin {
            delta: random_half(),
            min: random_half(),
        };
        let (d, dmin) = blk.delta_min.to_f32();
        let ans = <Q5K as Dequantize<f32, _256>>::dequantize(&blk);
        for (i, &y) in ans.iter().enumerate() {
            let sub = i / 32;
            let byte = blk.qs[32 * (i / 64) + i % 32];
            let low = if sub % 2 == 0 { byte & 0xf } else { byte >> 4 };
            let q = low | (blk.qh[i % 32] >> sub & 1) << 4;
            let (sc, m) = scale_min_k4(sub, &blk.scales);
            let expected = d * sc as f32 * q as f32 - dmin * m as f32;
            assert_eq!(y.to_bits(), expected.to_bits(), "element {i}");
        }
    }
}
