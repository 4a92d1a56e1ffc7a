use crate::{
    bf16, f16,
    fp16::{bf16_to_float, half_to_float},
    DataBlock, Dequantize, Fields, _1,
};

impl DataBlock for f32 {
    const COUNT: usize = _1;
    const SIZE: usize = 4;
    const ZEROS: Self = 0.;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Fields::new(bytes, Self::SIZE)?.f32()
    }
    #[inline]
    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes())
    }
}

impl Dequantize<f32, _1> for f32 {
    #[inline]
    fn dequantize(&self) -> [f32; _1] {
        [*self]
    }
}

impl DataBlock for f16 {
    const COUNT: usize = _1;
    const SIZE: usize = 2;
    const ZEROS: Self = Self::ZERO;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Fields::new(bytes, Self::SIZE)?.u16().map(f16::from_bits)
    }
    #[inline]
    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bits().to_le_bytes())
    }
}

impl Dequantize<f32, _1> for f16 {
    #[inline]
    fn dequantize(&self) -> [f32; _1] {
        [half_to_float(self.to_bits())]
    }
}

impl DataBlock for bf16 {
    const COUNT: usize = _1;
    const SIZE: usize = 2;
    const ZEROS: Self = Self::ZERO;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Fields::new(bytes, Self::SIZE)?.u16().map(bf16::from_bits)
    }
    #[inline]
    fn write_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bits().to_le_bytes())
    }
}

impl Dequantize<f32, _1> for bf16 {
    #[inline]
    fn dequantize(&self) -> [f32; _1] {
        [bf16_to_float(self.to_bits())]
    }
}
