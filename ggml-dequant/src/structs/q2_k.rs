use super::DeltaMin;
use crate::{DataBlock, Dequantize, Fields, _256};
use std::iter::zip;

/// 256 elements as 2-bit codes in 16 sub-blocks of 16.
///
/// Each byte of `scales` holds a sub-block scale in its low nibble and a sub-block min in its
/// high nibble, both relative to the super-block `delta_min`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q2K {
    pub scales: [u8; _256 / 16],
    pub qs: [u8; _256 / 4],
    pub delta_min: DeltaMin,
}

impl DataBlock for Q2K {
    const COUNT: usize = _256;
    const SIZE: usize = _256 / 16 + _256 / 4 + 4;
    const ZEROS: Self = Self {
        scales: [0; _256 / 16],
        qs: [0; _256 / 4],
        delta_min: DeltaMin::ZERO,
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            scales: fields.bytes()?,
            qs: fields.bytes()?,
            delta_min: DeltaMin::read(&mut fields)?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.scales);
        buf.extend_from_slice(&self.qs);
        self.delta_min.write(buf);
    }
}

impl Dequantize<f32, _256> for Q2K {
    fn dequantize(&self) -> [f32; _256] {
        let (delta, min) = self.delta_min.to_f32();

        // each 128-element half reads a 32-byte window 4 times, 2 bits deeper each pass,
        // as two 16-byte spans per pass
        let mut ans = [0.; _256];
        let mut y = ans.chunks_exact_mut(16);
        let mut scales = self.scales.iter();
        for q in self.qs.chunks_exact(32) {
            for shift in [0, 2, 4, 6] {
                for (q, (y, &sc)) in zip(q.chunks_exact(16), zip(&mut y, &mut scales)) {
                    let dl = delta * (sc & 0xf) as f32;
                    let ml = min * (sc >> 4) as f32;
                    for (y, &q) in zip(y, q) {
                        *y = dl * ((q >> shift) & 3) as f32 - ml;
                    }
                }
            }
        }
        ans
    }
}

#[test]
fn test_q2_k_reference() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q2K>(8) {
        blk.delta_min = DeltaMin {
            delta: random_half(),
            min: random_half(),
        };
        let (d, dmin) = blk.delta_min.to_f32();
        let ans = <Q2K as Dequantize<f32, _256>>::dequantize(&blk);
        for (i, &y) in ans.iter().enumerate() {
            let (half, pass, span, l) = (i / 128, i % 128 / 32, i % 32 / 16, i % 16);
            let q = blk.qs[32 * half + 16 * span + l] >> (2 * pass) & 3;
            let sc = blk.scales[i / 16];
            let expected = d * (sc & 0xf) as f32 * q as f32 - dmin * (sc >> 4) as f32;
            assert_eq!(y.to_bits(), expected.to_bits(), "element {i}");
        }
    }
}

#[test]
fn test_q2_k_min() {
    let blk = Q2K {
        // scale 2, min 3 everywhere
        scales: [0x32; _256 / 16],
        qs: [0b11_10_01_00; _256 / 4],
        delta_min: DeltaMin {
            delta: 0x3c00,
            min: 0x3800, // 0.5
        },
    };
    let ans = <Q2K as Dequantize<f32, _256>>::dequantize(&blk);
    for (i, &y) in ans.iter().enumerate() {
        let q = (i % 128 / 32) as f32;
        assert_eq!(y, 2. * q - 1.5, "element {i}");
    }
}
