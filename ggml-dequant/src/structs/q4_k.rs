use super::{scale_min_k4, DeltaMin, K_SCALE_SIZE};
use crate::{DataBlock, Dequantize, Fields, _256};

/// 256 elements as 4-bit codes in 8 sub-blocks of 32,
/// each with a 6-bit scale and a 6-bit min relative to the super-block `delta_min`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q4K {
    pub delta_min: DeltaMin,
    pub scales: [u8; K_SCALE_SIZE],
    pub qs: [u8; _256 / 2],
}

impl DataBlock for Q4K {
    const COUNT: usize = _256;
    const SIZE: usize = 4 + K_SCALE_SIZE + _256 / 2;
    const ZEROS: Self = Self {
        delta_min: DeltaMin::ZERO,
        scales: [0; K_SCALE_SIZE],
        qs: [0; _256 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta_min: DeltaMin::read(&mut fields)?,
            scales: fields.bytes()?,
            qs: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        self.delta_min.write(buf);
        buf.extend_from_slice(&self.scales);
        buf.extend_from_slice(&self.qs);
    }
}

impl Dequantize<f32, _256> for Q4K {
    fn dequantize(&self) -> [f32; _256] {
        let (delta, min) = self.delta_min.to_f32();

        // every 32 bytes of `qs` cover 64 elements: low nibbles first, then high nibbles
        let mut ans = [0.; _256];
        for (j, (q, y)) in self.qs.chunks_exact(32).zip(ans.chunks_exact_mut(64)).enumerate() {
            let (sc, m) = scale_min_k4(2 * j, &self.scales);
            let (d1, m1) = (delta * sc as f32, min * m as f32);
            let (sc, m) = scale_min_k4(2 * j + 1, &self.scales);
            let (d2, m2) = (delta * sc as f32, min * m as f32);

            let (l, h) = y.split_at_mut(32);
            for (i, &q) in q.iter().enumerate() {
                l[i] = d1 * (q & 0xf) as f32 - m1;
                h[i] = d2 * (q >> 4) as f32 - m2;
            }
        }
        ans
    }
}

#[test]
fn test_q4_k_uniform() {
    let blk = Q4K {
        delta_min: DeltaMin {
            delta: 0x3c00,
            min: 0,
        },
        // every 6-bit scale 1, every min 0
        scales: [1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1],
        qs: [0x55; _256 / 2],
    };
    assert_eq!(<Q4K as Dequantize<f32, _256>>::dequantize(&blk), [5.; _256]);
}

#[test]
fn test_q4_k_reference() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q4K>(8) {
        blk.delta_min = DeltaMin {
            delta: random_half(),
            min: random_half(),
        };
        let (d, dmin) = blk.delta_min.to_f32();
        let ans = <Q4K as Dequantize<f32, _256>>::dequantize(&blk);
        for (i, &y) in ans.iter().enumerate() {
            let sub = i / 32;
            let byte = blk.qs[32 * (i / 64) + i % 32];
            let q = if sub % 2 == 0 { byte & 0xf } else { byte >> 4 };
            let (sc, m) = scale_min_k4(sub, &blk.scales);
            let expected = d * sc as f32 * q as f32 - dmin * m as f32;
            assert_eq!(y.to_bits(), expected.to_bits(), "element {i}");
        }
    }
}
