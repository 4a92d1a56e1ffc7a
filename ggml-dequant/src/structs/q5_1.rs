use super::DeltaMin;
use crate::{DataBlock, Dequantize, Fields, _32};

/// 32 elements as unsigned 5-bit codes, with a binary16 scale and minimum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q5_1 {
    pub delta_min: DeltaMin,
    pub qh: [u8; _32 / 8],
    pub ql: [u8; _32 / 2],
}

impl DataBlock for Q5_1 {
    const COUNT: usize = _32;
    const SIZE: usize = 4 + _32 / 8 + _32 / 2;
    const ZEROS: Self = Self {
        delta_min: DeltaMin::ZERO,
        qh: [0; _32 / 8],
        ql: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta_min: DeltaMin::read(&mut fields)?,
            qh: fields.bytes()?,
            ql: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        self.delta_min.write(buf);
        buf.extend_from_slice(&self.qh);
        buf.extend_from_slice(&self.ql);
    }
}

impl Dequantize<f32, _32> for Q5_1 {
    fn dequantize(&self) -> [f32; _32] {
        let (delta, min) = self.delta_min.to_f32();
        let qh = u32::from_le_bytes(self.qh);
        let f = |l: u8, h: u32| (l | (h as u8 & 0x10)) as f32 * delta + min;

        let mut ans = [0.; _32];
        let (l, h) = ans.split_at_mut(_32 / 2);
        #[rustfmt::skip]
        for (i, &x) in self.ql.iter().enumerate() {
            l[i] = f(x & 0xf, (qh >>  i               ) << 4);
            h[i] = f(x >>  4,  qh >> (i + _32 / 2 - 4)      );
        };
        ans
    }
}

#[test]
fn test_q5_1() {
    let mut ql = [0; _32 / 2];
    for (i, q) in ql.iter_mut().enumerate() {
        *q = ((i as u8) << 4) | i as u8;
    }
    let blk = Q5_1 {
        delta_min: DeltaMin {
            delta: 0x3c00,
            min: 0x4000, // 2.0
        },
        // 5th bit set on the whole second half
        qh: 0xffff_0000u32.to_le_bytes(),
        ql,
    };
    let ans = <Q5_1 as Dequantize<f32, _32>>::dequantize(&blk);
    for i in 0.._32 / 2 {
        assert_eq!(ans[i], i as f32 + 2.);
        assert_eq!(ans[i + _32 / 2], (i + 16) as f32 + 2.);
    }
}
