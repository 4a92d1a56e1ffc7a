use crate::{fp16::e8m0_to_float_half, DataBlock, Dequantize, Fields, _32};

/// E2M1 magnitudes doubled, sign in bit 3, paired with the halved E8M0 scale.
const MXFP4_VALUES: [i8; 16] = [0, 1, 2, 3, 4, 6, 8, 12, 0, -1, -2, -3, -4, -6, -8, -12];

/// 32 elements as 4-bit E2M1 codes sharing one E8M0 exponent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MXFP4 {
    pub e: u8,
    pub qs: [u8; _32 / 2],
}

impl DataBlock for MXFP4 {
    const COUNT: usize = _32;
    const SIZE: usize = 1 + _32 / 2;
    const ZEROS: Self = Self {
        e: 0,
        qs: [0; _32 / 2],
    };

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes, Self::SIZE)?;
        Some(Self {
            e: fields.u8()?,
            qs: fields.bytes()?,
        })
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.push(self.e);
        buf.extend_from_slice(&self.qs);
    }
}

impl Dequantize<f32, _32> for MXFP4 {
    #[inline]
    fn dequantize(&self) -> [f32; _32] {
        let delta = e8m0_to_float_half(self.e);
        let value = |i: u8| MXFP4_VALUES[i as usize] as f32 * delta;

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
fn test_mxfp4() {
    let blk = MXFP4 {
        e: 128, // halved scale 1.0, so codes read as twice their E2M1 value
        qs: std::array::from_fn(|i| i as u8 | 0x90),
    };
    let ans = <MXFP4 as Dequantize<f32, _32>>::dequantize(&blk);
    assert_eq!(
        ans[..16],
        [0., 1., 2., 3., 4., 6., 8., 12., 0., -1., -2., -3., -4., -6., -8., -12.]
    );
    assert_eq!(ans[16..], [-1.; 16]);

    let blk = MXFP4 { e: 127, ..blk };
    let ans = <MXFP4 as Dequantize<f32, _32>>::dequantize(&blk);
    assert_eq!(ans[7], 6.);
    assert_eq!(ans[16], -0.5);
}

#[test]
fn test_mxfp4_bytes() {
    let bytes = [0x81, 0x21, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let blk = MXFP4::from_bytes(&bytes).unwrap();
    assert_eq!(blk.e, 0x81);
    let ans = <MXFP4 as Dequantize<f32, _32>>::dequantize(&blk);
    assert_eq!((ans[0], ans[16]), (2., 4.));

    let mut buf = Vec::new();
    blk.write_bytes(&mut buf);
    assert_eq!(buf, bytes);
    assert!(MXFP4::from_bytes(&bytes[1..]).is_none());
}
