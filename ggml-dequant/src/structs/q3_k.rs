use super::K_SCALE_SIZE;
use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _256};
use std::iter::zip;

/// 256 elements as 3-bit codes in 16 sub-blocks of 16.
///
/// The low 2 bits of each code live in `qs`, the high bit in `hmask`.
/// The 16 sub-block scales are signed 6-bit values packed into 12 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q3K {
    pub hmask: [u8; _256 / 8],
    pub qs: [u8; _256 / 4],
    pub scales: [u8; K_SCALE_SIZE],
    pub delta: u16,
}

impl DataBlock for Q3K {
    const COUNT: usize = _256;
    const SIZE: usize = _256 / 8 + _256 / 4 + K_SCALE_SIZE + 2;
    const ZEROS: Self = Self {
        hmask: [0; _256 / 8],
        qs: [0; _256 / 4],
        scales: [0; K_SCALE_SIZE],
        delta: 0,
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            hmask: fields.bytes()?,
            qs: fields.bytes()?,
            scales: fields.bytes()?,
            delta: fields.u16()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.hmask);
        buf.extend_from_slice(&self.qs);
        buf.extend_from_slice(&self.scales);
        buf.extend_from_slice(&self.delta.to_le_bytes());
    }
}

/// Unpacks the 16 sub-block scales of a [`Q3K`], already offset by -32.
///
/// Viewed as three little-endian words `a0 a1 tmp`, the low nibbles of scales `0..8` and the
/// high nibbles of scales `8..16` come from `a0 a1`, and each scale takes its top 2 bits from
/// `tmp`, 2 bits per byte per group of 4 scales.
fn unpack_scales(scales: &[u8; K_SCALE_SIZE]) -> [i8; 16] {
    const KMASK1: u32 = 0x0303_0303;
    const KMASK2: u32 = 0x0f0f_0f0f;

    let word = |i: usize| {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&scales[4 * i..][..4]);
        u32::from_le_bytes(bytes)
    };
    let (a0, a1, tmp) = (word(0), word(1), word(2));

    #[rustfmt::skip]
    let words = [
        ( a0       & KMASK2) | (((tmp     ) & KMASK1) << 4),
        ( a1       & KMASK2) | (((tmp >> 2) & KMASK1) << 4),
        ((a0 >> 4) & KMASK2) | (((tmp >> 4) & KMASK1) << 4),
        ((a1 >> 4) & KMASK2) | (((tmp >> 6) & KMASK1) << 4),
    ];

    let mut ans = [0; 16];
    for (dst, word) in zip(ans.chunks_exact_mut(4), words) {
        for (dst, b) in zip(dst, word.to_le_bytes()) {
            *dst = b as i8 - 32;
        }
    }
    ans
}

impl Dequantize<f32, _256> for Q3K {
    fn dequantize(&self) -> [f32; _256] {
        let delta = half_to_float(self.delta);
        let scales = unpack_scales(&self.scales);

        // same 2-bit walk as Q2K; the high bit of pass `m` is bit `m` of `hmask`
        let mut ans = [0.; _256];
        let mut y = ans.chunks_exact_mut(16);
        let mut scales = scales.iter();
        let mut m = 0;
        for q in self.qs.chunks_exact(32) {
            for shift in [0, 2, 4, 6] {
                let spans = zip(q.chunks_exact(16), self.hmask.chunks_exact(16));
                for ((q, hm), (y, &sc)) in zip(spans, zip(&mut y, &mut scales)) {
                    let dl = delta * sc as f32;
                    for (y, (&q, &hm)) in zip(y, zip(q, hm)) {
                        let high = if hm & (1 << m) != 0 { 0 } else { 4 };
                        *y = dl * (((q >> shift) & 3) as i8 - high) as f32;
                    }
                }
                m += 1;
            }
        }
        ans
    }
}

#[test]
fn test_unpack_scales() {
    // scale `i` stored as `i + 32 + (i % 3)` so it unpacks to `i + i % 3`
    let raw: [u8; 16] = std::array::from_fn(|i| (i + 32 + i % 3) as u8);
    let mut packed = [0u8; K_SCALE_SIZE];
    for (j, &s) in raw.iter().enumerate() {
        let (lo, hi) = (s & 0xf, s >> 4);
        if j < 8 {
            packed[j] |= lo;
        } else {
            packed[j - 8] |= lo << 4;
        }
        packed[8 + j % 4] |= hi << (2 * (j / 4));
    }

    let ans = unpack_scales(&packed);
    for (i, &s) in ans.iter().enumerate() {
        assert_eq!(s as usize, i + i % 3, "scale {i}");
    }

    assert_eq!(unpack_scales(&[0; K_SCALE_SIZE]), [-32; 16]);
    assert_eq!(unpack_scales(&[0xff; K_SCALE_SIZE]), [31; 16]);
}

#[test]
fn test_q3_k_reference() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q3K>(8) {
        blk.delta = random_half();
        let d = half_to_float(blk.delta);
        let scales = unpack_scales(&blk.scales);
        let ans = <Q3K as Dequantize<f32, _256>>::dequantize(&blk);
        for (i, &y) in ans.iter().enumerate() {
            let (half, pass, span, l) = (i / 128, i % 128 / 32, i % 32 / 16, i % 16);
            let low = (blk.qs[32 * half + 16 * span + l] >> (2 * pass) & 3) as i8;
            let high = blk.hmask[16 * span + l] >> (4 * half + pass) & 1;
            let q = low - if high == 1 { 0 } else { 4 };
            let expected = d * scales[i / 16] as f32 * q as f32;
            assert_eq!(y.to_bits(), expected.to_bits(), "element {i}");
        }
    }
}

#[test]
fn test_q3_k_missing_high_bit() {
    // scales all 33 -> 1 after the offset, low bits zero, no high bits: every code is -4
    let mut blk = Q3K::ZEROS;
    blk.delta = 0x3c00;
    blk.scales = [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0xaa, 0xaa, 0xaa, 0xaa];
    let ans = <Q3K as Dequantize<f32, _256>>::dequantize(&blk);
    assert_eq!(ans, [-4.; _256]);

    blk.hmask = [0xff; _256 / 8];
    let ans = <Q3K as Dequantize<f32, _256>>::dequantize(&blk);
    assert_eq!(ans, [0.; _256]);
}
