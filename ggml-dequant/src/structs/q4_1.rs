use super::DeltaMin;
use crate::{DataBlock, Dequantize, Fields, _32};

/// 32 elements as unsigned 4-bit codes, with a binary16 scale and minimum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q4_1 {
    pub delta_min: DeltaMin,
    pub quants: [u8; _32 / 2],
}

impl DataBlock for Q4_1 {
    const COUNT: usize = _32;
    const SIZE: usize = 4 + _32 / 2;
    const ZEROS: Self = Self {
        delta_min: DeltaMin::ZERO,
        quants: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta_min: DeltaMin::read(&mut fields)?,
            quants: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        self.delta_min.write(buf);
        buf.extend_from_slice(&self.quants);
    }
}

impl Dequantize<f32, _32> for Q4_1 {
    fn dequantize(&self) -> [f32; _32] {
        let (delta, min) = self.delta_min.to_f32();
        let f = |x: u8| x as f32 * delta + min;

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
fn test_q4_1() {
    let blk = Q4_1 {
        delta_min: DeltaMin {
            delta: 0x3800, // 0.5
            min: 0xbc00,   // -1.0
        },
        quants: [0xf0; _32 / 2],
    };
    let ans = <Q4_1 as Dequantize<f32, _32>>::dequantize(&blk);
    assert_eq!(ans[..16], [-1.; 16]);
    assert_eq!(ans[16..], [6.5; 16]);

    // d = 1.0, m = 0.0, all codes zero
    let mut bytes = vec![0; Q4_1::SIZE];
    bytes[1] = 0x3c;
    let blk = Q4_1::from_bytes(&bytes).unwrap();
    assert_eq!(<Q4_1 as Dequantize<f32, _32>>::dequantize(&blk), [0.; _32]);
}
