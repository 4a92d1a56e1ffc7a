use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _32};

/// 32 elements as signed 8-bit codes, with one binary16 scale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q8_0 {
    pub delta: u16,
    pub quants: [i8; _32],
}

impl DataBlock for Q8_0 {
    const COUNT: usize = _32;
    const SIZE: usize = 2 + _32;
    const ZEROS: Self = Self {
        delta: 0,
        quants: [0; _32],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta: fields.u16()?,
            quants: fields.i8s()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend(self.quants.iter().map(|&x| x as u8));
    }
}

impl Dequantize<f32, _32> for Q8_0 {
    #[inline]
    fn dequantize(&self) -> [f32; _32] {
        let delta = half_to_float(self.delta);
        self.quants.map(|x| x as f32 * delta)
    }
}

#[test]
fn test_q8_0() {
    let mut quants = [0; _32];
    for (i, q) in quants.iter_mut().enumerate() {
        *q = (i as i32 * 8 - 128) as i8;
    }
    let blk = Q8_0 {
        delta: 0x3400, // 0.25
        quants,
    };
    let ans = <Q8_0 as Dequantize<f32, _32>>::dequantize(&blk);
    for (i, &y) in ans.iter().enumerate() {
        assert_eq!(y, (i as f32 * 8. - 128.) * 0.25);
    }
}

#[test]
fn test_q8_0_block_order() {
    use crate::DequantExt;

    let blocks = [
        Q8_0 {
            delta: 0x3c00,
            quants: [3; _32],
        },
        Q8_0 {
            delta: 0x4000,
            quants: [3; _32],
        },
    ];
    let ans = <Q8_0 as DequantExt<f32, _32>>::dequantize_vec(&blocks, 2 * _32).unwrap();
    assert_eq!(ans[.._32], [3.; _32]);
    assert_eq!(ans[_32..], [6.; _32]);
}
