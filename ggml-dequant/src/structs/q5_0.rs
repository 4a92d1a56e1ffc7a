use crate::{fp16::half_to_float, DataBlock, Dequantize, Fields, _32};

/// 32 elements as 5-bit codes offset by 16, with one binary16 scale.
///
/// The low 4 bits of each code are packed as nibbles in `ql`,
/// the 5th bit of element `i` is bit `i` of the little-endian word `qh`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Q5_0 {
    pub delta: u16,
    pub qh: [u8; _32 / 8],
    pub ql: [u8; _32 / 2],
}

impl DataBlock for Q5_0 {
    const COUNT: usize = _32;
    const SIZE: usize = 2 + _32 / 8 + _32 / 2;
    const ZEROS: Self = Self {
        delta: 0,
        qh: [0; _32 / 8],
        ql: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            delta: fields.u16()?,
            qh: fields.bytes()?,
            ql: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.delta.to_le_bytes());
        buf.extend_from_slice(&self.qh);
        buf.extend_from_slice(&self.ql);
    }
}

impl Dequantize<f32, _32> for Q5_0 {
    fn dequantize(&self) -> [f32; _32] {
        let delta = half_to_float(self.delta);
        let qh = u32::from_le_bytes(self.qh);
        let f = |l: u8, h: u32| ((l | (h as u8 & 0x10)) as i32 - 16) as f32 * delta;

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
fn test_q5_0_high_bits() {
    // only elements 3 and 16 + 5 carry a 5th bit
    let qh = (1u32 << 3) | (1 << (16 + 5));
    let blk = Q5_0 {
        delta: 0x3c00,
        qh: qh.to_le_bytes(),
        ql: [0x00; _32 / 2],
    };
    let ans = <Q5_0 as Dequantize<f32, _32>>::dequantize(&blk);
    for (i, &y) in ans.iter().enumerate() {
        let expected = if i == 3 || i == 21 { 0. } else { -16. };
        assert_eq!(y, expected, "element {i}");
    }

    let blk = Q5_0 {
        delta: 0x3800, // 0.5
        qh: [0xff; 4],
        ql: [0xff; _32 / 2],
    };
    assert_eq!(<Q5_0 as Dequantize<f32, _32>>::dequantize(&blk), [7.5; _32]);
}
