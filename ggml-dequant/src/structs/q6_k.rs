use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _256};

/// 256 elements as 6-bit codes in 16 sub-blocks of 16, each with a signed 8-bit scale.
///
/// The low 4 bits of each code live in `ql`, the high 2 bits in `qh`.
/// Codes are stored offset by 32.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q6K {
    pub ql: [u8; _256 / 2],
    pub qh: [u8; _256 / 4],
    pub scales: [i8; _256 / 16],
    pub delta: u16,
}

impl DataBlock for Q6K {
    const COUNT: usize = _256;
    const SIZE: usize = _256 / 2 + _256 / 4 + _256 / 16 + 2;
    const ZEROS: Self = Self {
        ql: [0; _256 / 2],
        qh: [0; _256 / 4],
        scales: [0; _256 / 16],
        delta: 0,
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            ql: fields.bytes()?,
            qh: fields.bytes()?,
            scales: fields.i8s()?,
            delta: fields.u16()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.ql);
        buf.extend_from_slice(&self.qh);
        buf.extend(self.scales.iter().map(|&x| x as u8));
        buf.extend_from_slice(&self.delta.to_le_bytes());
    }
}

impl Dequantize<f32, _256> for Q6K {
    fn dequantize(&self) -> [f32; _256] {
        let delta = half_to_float(self.delta);

        // each half of 128 elements takes 64 bytes of `ql`, 32 bytes of `qh` and 8 scales;
        // the four quarters read low/high nibbles of `ql[..32]`/`ql[32..]`
        // and successive 2-bit fields of `qh`
        let mut ans = [0.; _256];
        let halves = self.ql.chunks_exact(64).zip(self.qh.chunks_exact(32));
        let spans = ans.chunks_exact_mut(128).zip(self.scales.chunks_exact(8));
        for ((ql, qh), (y, sc)) in halves.zip(spans) {
            for l in 0..32 {
                let is = l / 16;
                #[rustfmt::skip]
                let q = [
                    (ql[l     ] & 0xf) | (((qh[l]     ) & 3) << 4),
                    (ql[l + 32] & 0xf) | (((qh[l] >> 2) & 3) << 4),
                    (ql[l     ] >>  4) | (((qh[l] >> 4) & 3) << 4),
                    (ql[l + 32] >>  4) | (((qh[l] >> 6) & 3) << 4),
                ];
                for (k, q) in q.into_iter().enumerate() {
                    let q = q as i8 - 32;
                    y[l + 32 * k] = delta * sc[is + 2 * k] as f32 * q as f32;
                }
            }
        }
        ans
    }
}

#[test]
fn test_q6_k_offset() {
    let blk = Q6K {
        delta: 0x3c00,
        scales: [1; _256 / 16],
        ..Q6K::ZEROS
    };
    assert_eq!(<Q6K as Dequantize<f32, _256>>::dequantize(&blk), [-32.; _256]);

    let blk = Q6K {
        ql: [0xff; _256 / 2],
        qh: [0xff; _256 / 4],
        scales: [-2; _256 / 16],
        delta: 0x3800, // 0.5
    };
    assert_eq!(<Q6K as Dequantize<f32, _256>>::dequantize(&blk), [-31.; _256]);
}

#[test]
fn test_q6_k_reference() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q6K>(8) {
        blk.delta = random_half();
        let d = half_to_float(blk.delta);
        let ans = <Q6K as Dequantize<f32, _256>>::dequantize(&blk);
        for (i, &y) in ans.iter().enumerate() {
            let (half, quarter, l) = (i / 128, i % 128 / 32, i % 32);
            let byte = blk.ql[64 * half + 32 * (quarter % 2) + l];
            let low = if quarter < 2 { byte & 0xf } else { byte >> 4 };
            let high = blk.qh[32 * half + l] >> (2 * quarter) & 3;
            let q = (low | high << 4) as i32 - 32;
            let expected = d * blk.scales[i / 16] as f32 * q as f32;
            assert_eq!(y.to_bits(), expected.to_bits(), "element {i}");
        }
    }
}
