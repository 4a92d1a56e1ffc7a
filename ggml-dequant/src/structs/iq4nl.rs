use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _32};

/// Non-linear codebook indexed by the 4-bit codes of [`IQ4NL`].
pub const IQ4NL_VALUES: [i8; 16] = [
    -127, -104, -83, -65, -49, -35, -22, -10, 1, 13, 25, 38, 53, 69, 89, 113,
];

/// 32 elements as 4-bit indices into [`IQ4NL_VALUES`], with one binary16 scale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IQ4NL {
    pub delta: u16,
    pub qs: [u8; _32 / 2],
}

impl DataBlock for IQ4NL {
    const COUNT: usize = _32;
    const SIZE: usize = 2 + _32 / 2;
    // the codebook has no zero entry; a zero scale is the only all-zero block
    const ZEROS: Self = Self {
        delta: 0,
        qs: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta: fields.u16()?,
            qs: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend_from_slice(&self.qs);
    }
}

impl Dequantize<f32, _32> for IQ4NL {
    #[inline]
    fn dequantize(&self) -> [f32; _32] {
        let delta = half_to_float(self.delta);
        let value = |i: u8| delta * IQ4NL_VALUES[i as usize] as f32;

        let mut ans = [0.; _32];
        let (l, h) = ans.split_at_mut(_32 / 2);
        for (i, &q) in self.qs.iter().enumerate() {
            l[i] = value(q & 0xf);
            h[i] = value(q >> 4);
        }
        ans
    }
}

#[test]
fn test_iq4nl_codebook() {
    let mut qs = [0x88; _32 / 2];
    qs[0] = 0xf0;
    let blk = IQ4NL {
        delta: 0x3c00,
        qs,
    };
    let ans = <IQ4NL as Dequantize<f32, _32>>::dequantize(&blk);
    assert_eq!(ans[0], -127.);
    assert_eq!(ans[16], 113.);
    assert!(ans.iter().enumerate().all(|(i, &y)| i % 16 == 0 || y == 1.));
}

#[test]
fn test_iq4nl_scaled() {
    let blk = IQ4NL {
        delta: 0x3800, // 0.5
        qs: std::array::from_fn(|i| (i as u8) | (15 - i as u8) << 4),
    };
    let ans = <IQ4NL as Dequantize<f32, _32>>::dequantize(&blk);
    for i in 0..16 {
        assert_eq!(ans[i], IQ4NL_VALUES[i] as f32 * 0.5);
        assert_eq!(ans[i + 16], IQ4NL_VALUES[15 - i] as f32 * 0.5);
    }
}
