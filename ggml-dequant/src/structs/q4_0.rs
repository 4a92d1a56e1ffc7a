use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _32};

/// 32 elements as 4-bit codes offset by 8, with one binary16 scale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q4_0 {
    pub delta: u16,
    pub quants: [u8; _32 / 2],
}

impl DataBlock for Q4_0 {
    const COUNT: usize = _32;
    const SIZE: usize = 2 + _32 / 2;
    const ZEROS: Self = Self {
        delta: 0,
        quants: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta: fields.u16()?,
            quants: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend_from_slice(&self.quants);
    }
}

impl Dequantize<f32, _32> for Q4_0 {
    fn dequantize(&self) -> [f32; _32] {
        let delta = half_to_float(self.delta);
        let f = |x: u8| (x as i32 - 8) as f32 * delta;

        let mut ans = [0.; _32];
        let (l, h) = ans.split_at_mut(_32 / 2);
        for (i, &x) in self.quants.iter().enumerate() {
            l[i] = f(x & 0xf);
            h[i] = f(x >> 4);
        }
        ans
    }
}

#[test]
fn test_q4_0_zero_point() {
    let blk = Q4_0 {
        delta: 0x3c00,
        quants: [0x88; _32 / 2],
    };
    assert_eq!(<Q4_0 as Dequantize<f32, _32>>::dequantize(&blk), [0.; _32]);
}

#[test]
fn test_q4_0_nibble_order() {
    let mut quants = [0; _32 / 2];
    for (i, q) in quants.iter_mut().enumerate() {
        *q = ((15 - i as u8) << 4) | i as u8;
    }
    let blk = Q4_0 {
        delta: 0xc000, // -2.0
        quants,
    };
    let ans = <Q4_0 as Dequantize<f32, _32>>::dequantize(&blk);
    for i in 0.._32 / 2 {
        assert_eq!(ans[i], (i as f32 - 8.) * -2.);
        assert_eq!(ans[i + _32 / 2], (7. - i as f32) * -2.);
    }
}
