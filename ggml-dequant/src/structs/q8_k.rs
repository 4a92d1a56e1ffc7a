use crate::{DataBlock, Dequantize, Fields, _256};

/// 256 elements as signed 8-bit codes with an `f32` scale.
///
/// `sums` holds the sum of every 16 codes for dot-product kernels; decoding ignores it.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Q8K {
    pub delta: f32,
    pub quants: [i8; _256],
    pub sums: [i16; _256 / 16],
}

impl DataBlock for Q8K {
    const COUNT: usize = _256;
    const SIZE: usize = 4 + _256 + 2 * _256 / 16;
    const ZEROS: Self = Self {
        delta: 0.,
        quants: [0; _256],
        sums: [0; _256 / 16],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta: fields.f32()?,
            quants: fields.i8s()?,
            sums: fields.i16s()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend(self.quants.iter().map(|&x| x as u8));
        buf.extend(self.sums.iter().flat_map(|x| x.to_le_bytes()));
    }
}

impl Dequantize<f32, _256> for Q8K {
    #[inline]
    fn dequantize(&self) -> [f32; _256] {
        let delta = self.delta;
        self.quants.map(|x| delta * x as f32)
    }
}

#[test]
fn test_q8_k() {
    let mut quants = [0; _256];
    for (i, q) in quants.iter_mut().enumerate() {
        *q = (i as u8).wrapping_sub(128) as i8;
    }
    let blk = Q8K {
        delta: 0.5,
        quants,
        // nonsense sums must not leak into the output
        sums: [i16::MIN; _256 / 16],
    };
    let ans = <Q8K as Dequantize<f32, _256>>::dequantize(&blk);
    for (i, &y) in ans.iter().enumerate() {
        assert_eq!(y, (i as f32 - 128.) * 0.5);
    }

    let mut bytes = Vec::new();
    blk.write_bytes(&mut bytes);
    assert_eq!(bytes.len(), Q8K::SIZE);
    assert_eq!(Q8K::from_bytes(&bytes), Some(blk));
}
