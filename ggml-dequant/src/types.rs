use crate::{
    bf16, f16, DataBlock, Dequantize, InvalidLength, IQ4NL, MXFP4, Q2K, Q3K, Q4K, Q4_0, Q4_1, Q5K,
    Q5_0, Q5_1, Q6K, Q8K, Q8_0,
};
use log::trace;
use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::{ParallelSlice, ParallelSliceMut},
};
use std::{error::Error, fmt, iter::zip, str::FromStr};

/// Element formats with a decoder, numbered as in GGUF tensor infos.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
pub enum GGmlType {
    F32 = 0,
    F16 = 1,
    Q4_0 = 2,
    Q4_1 = 3,
    Q5_0 = 6,
    Q5_1 = 7,
    Q8_0 = 8,
    Q2K = 10,
    Q3K = 11,
    Q4K = 12,
    Q5K = 13,
    Q6K = 14,
    Q8K = 15,
    IQ4NL = 20,
    BF16 = 30,
    MXFP4 = 39,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GGmlTypeSize {
    /// Elements per block.
    pub block_size: u32,
    /// Bytes per block.
    pub type_size: u32,
}

impl GGmlType {
    pub const ALL: [Self; 16] = [
        Self::F32,
        Self::F16,
        Self::Q4_0,
        Self::Q4_1,
        Self::Q5_0,
        Self::Q5_1,
        Self::Q8_0,
        Self::Q2K,
        Self::Q3K,
        Self::Q4K,
        Self::Q5K,
        Self::Q6K,
        Self::Q8K,
        Self::IQ4NL,
        Self::BF16,
        Self::MXFP4,
    ];

    pub const fn size(self) -> GGmlTypeSize {
        const QK_K: u32 = 256;
        #[rustfmt::skip]
        let (block_size, type_size) = match self {
            Self::F32   => (  1, 4),
            Self::F16   => (  1, 2),
            Self::BF16  => (  1, 2),
            Self::Q4_0  => ( 32, 2 + 16),
            Self::Q4_1  => ( 32, 2 + 2 + 16),
            Self::Q5_0  => ( 32, 2 + 4 + 16),
            Self::Q5_1  => ( 32, 2 + 2 + 4 + 16),
            Self::Q8_0  => ( 32, 2 + 32),
            Self::IQ4NL => ( 32, 2 + 16),
            Self::MXFP4 => ( 32, 1 + 16),
            Self::Q2K   => (256, 2 + 2 + QK_K / 16 + QK_K / 4),
            Self::Q3K   => (256, 2 + QK_K / 4 + QK_K / 8 + 12),
            Self::Q4K   => (256, 2 + 2 + QK_K / 2 + 12),
            Self::Q5K   => (256, 2 + 2 + QK_K / 2 + QK_K / 8 + 12),
            Self::Q6K   => (256, 2 + QK_K / 2 + QK_K / 4 + QK_K / 16),
            Self::Q8K   => (256, 4 + QK_K + QK_K / 8),
        };
        GGmlTypeSize {
            block_size,
            type_size,
        }
    }

    #[inline]
    pub fn bits_per_weight(self) -> f64 {
        let GGmlTypeSize {
            block_size,
            type_size,
        } = self.size();
        (type_size * 8) as f64 / block_size as f64
    }

    /// Bytes occupied by `elements` values of this type.
    pub fn nbytes(self, elements: usize) -> Result<usize, InvalidLength> {
        let GGmlTypeSize {
            block_size,
            type_size,
        } = self.size();
        let block = block_size as usize;
        if elements % block != 0 {
            return Err(InvalidLength::Indivisible { elements, block });
        }
        (elements / block)
            .checked_mul(type_size as usize)
            .ok_or(InvalidLength::Overflow { elements })
    }

    /// Decodes serialized blocks of this type from `data` into `dst`.
    ///
    /// `data` must hold exactly the blocks covering `dst.len()` elements.
    pub fn dequantize(self, data: &[u8], dst: &mut [f32]) -> Result<(), InvalidLength> {
        self.decode(data, dst, false)
    }

    /// Same as [`dequantize`](Self::dequantize), with blocks spread across the rayon pool.
    pub fn par_dequantize(self, data: &[u8], dst: &mut [f32]) -> Result<(), InvalidLength> {
        self.decode(data, dst, true)
    }

    fn decode(self, data: &[u8], dst: &mut [f32], parallel: bool) -> Result<(), InvalidLength> {
        trace!(
            "dequantize {self}: {} bytes -> {} elements{}",
            data.len(),
            dst.len(),
            if parallel { " (parallel)" } else { "" },
        );
        #[rustfmt::skip]
        let f: fn(&[u8], &mut [f32], bool) -> Result<(), InvalidLength> = match self {
            Self::F32   => decode_bytes::<f32  ,   1>,
            Self::F16   => decode_bytes::<f16  ,   1>,
            Self::BF16  => decode_bytes::<bf16 ,   1>,
            Self::Q4_0  => decode_bytes::<Q4_0 ,  32>,
            Self::Q4_1  => decode_bytes::<Q4_1 ,  32>,
            Self::Q5_0  => decode_bytes::<Q5_0 ,  32>,
            Self::Q5_1  => decode_bytes::<Q5_1 ,  32>,
            Self::Q8_0  => decode_bytes::<Q8_0 ,  32>,
            Self::IQ4NL => decode_bytes::<IQ4NL,  32>,
            Self::MXFP4 => decode_bytes::<MXFP4,  32>,
            Self::Q2K   => decode_bytes::<Q2K  , 256>,
            Self::Q3K   => decode_bytes::<Q3K  , 256>,
            Self::Q4K   => decode_bytes::<Q4K  , 256>,
            Self::Q5K   => decode_bytes::<Q5K  , 256>,
            Self::Q6K   => decode_bytes::<Q6K  , 256>,
            Self::Q8K   => decode_bytes::<Q8K  , 256>,
        };
        f(data, dst, parallel)
    }
}

fn decode_bytes<B, const N: usize>(
    data: &[u8],
    dst: &mut [f32],
    parallel: bool,
) -> Result<(), InvalidLength>
where
    B: Dequantize<f32, N>,
{
    let elements = dst.len();
    if elements % N != 0 {
        return Err(InvalidLength::Indivisible { elements, block: N });
    }
    let expected = (elements / N)
        .checked_mul(B::SIZE)
        .ok_or(InvalidLength::Overflow { elements })?;
    let found = data.len();
    if found != expected {
        return Err(InvalidLength::ByteCount { expected, found });
    }

    if parallel {
        dst.par_chunks_exact_mut(N)
            .zip(data.par_chunks_exact(B::SIZE))
            .try_for_each(|(dst, bytes)| decode_block::<B, N>(dst, bytes))
    } else {
        zip(dst.chunks_exact_mut(N), data.chunks_exact(B::SIZE))
            .try_for_each(|(dst, bytes)| decode_block::<B, N>(dst, bytes))
    }
}

#[inline]
fn decode_block<B, const N: usize>(dst: &mut [f32], bytes: &[u8]) -> Result<(), InvalidLength>
where
    B: Dequantize<f32, N>,
{
    let blk = B::from_bytes(bytes).ok_or(InvalidLength::ByteCount {
        expected: B::SIZE,
        found: bytes.len(),
    })?;
    dst.copy_from_slice(&Dequantize::<f32, N>::dequantize(&blk));
    Ok(())
}

impl TryFrom<u32> for GGmlType {
    type Error = GGmlTypeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|&ty| ty as u32 == value)
            .ok_or(GGmlTypeError::Id(value))
    }
}

impl GGmlType {
    #[rustfmt::skip]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32   => "f32",
            Self::F16   => "f16",
            Self::BF16  => "bf16",
            Self::Q4_0  => "q4_0",
            Self::Q4_1  => "q4_1",
            Self::Q5_0  => "q5_0",
            Self::Q5_1  => "q5_1",
            Self::Q8_0  => "q8_0",
            Self::IQ4NL => "iq4_nl",
            Self::MXFP4 => "mxfp4",
            Self::Q2K   => "q2_k",
            Self::Q3K   => "q3_k",
            Self::Q4K   => "q4_k",
            Self::Q5K   => "q5_k",
            Self::Q6K   => "q6_k",
            Self::Q8K   => "q8_k",
        }
    }
}

impl fmt::Display for GGmlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GGmlType {
    type Err = GGmlTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GGmlTypeError::Name(s.to_string()))
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GGmlTypeError {
    Id(u32),
    Name(String),
}

impl fmt::Display for GGmlTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "unsupported ggml type id {id}"),
            Self::Name(name) => write!(f, "unknown ggml type \"{name}\""),
        }
    }
}

impl Error for GGmlTypeError {}

const _: () = {
    assert!(Q2K::SIZE == 84);
    assert!(Q3K::SIZE == 110);
    assert!(Q4K::SIZE == 144);
    assert!(Q5K::SIZE == 176);
    assert!(Q6K::SIZE == 210);
    assert!(Q8K::SIZE == 292);
};

#[test]
fn test_sizes_agree() {
    fn check<B: DataBlock>(ty: GGmlType) {
        let size = ty.size();
        assert_eq!(size.block_size as usize, B::COUNT, "{ty}");
        assert_eq!(size.type_size as usize, B::SIZE, "{ty}");
    }

    check::<f32>(GGmlType::F32);
    check::<f16>(GGmlType::F16);
    check::<bf16>(GGmlType::BF16);
    check::<Q4_0>(GGmlType::Q4_0);
    check::<Q4_1>(GGmlType::Q4_1);
    check::<Q5_0>(GGmlType::Q5_0);
    check::<Q5_1>(GGmlType::Q5_1);
    check::<Q8_0>(GGmlType::Q8_0);
    check::<IQ4NL>(GGmlType::IQ4NL);
    check::<MXFP4>(GGmlType::MXFP4);
    check::<Q2K>(GGmlType::Q2K);
    check::<Q3K>(GGmlType::Q3K);
    check::<Q4K>(GGmlType::Q4K);
    check::<Q5K>(GGmlType::Q5K);
    check::<Q6K>(GGmlType::Q6K);
    check::<Q8K>(GGmlType::Q8K);

    assert_eq!(GGmlType::Q4_0.bits_per_weight(), 4.5);
    assert_eq!(GGmlType::Q6K.bits_per_weight(), 6.5625);
    assert_eq!(GGmlType::Q8_0.nbytes(64), Ok(68));
    assert_eq!(
        GGmlType::F32.nbytes(usize::MAX),
        Err(InvalidLength::Overflow {
            elements: usize::MAX
        })
    );
    assert!(GGmlType::Q8K.nbytes(usize::MAX / 256 * 256).is_err());
    assert_eq!(
        GGmlType::Q4K.nbytes(100),
        Err(InvalidLength::Indivisible {
            elements: 100,
            block: 256
        })
    );
}

#[test]
fn test_ids_and_names() {
    for ty in GGmlType::ALL {
        assert_eq!(GGmlType::try_from(ty as u32), Ok(ty));
        assert_eq!(ty.to_string().parse::<GGmlType>(), Ok(ty));
    }
    assert_eq!(GGmlType::try_from(12), Ok(GGmlType::Q4K));
    assert_eq!(GGmlType::try_from(4), Err(GGmlTypeError::Id(4)));
    assert_eq!("Q4_K".parse::<GGmlType>(), Ok(GGmlType::Q4K));
    assert_eq!(
        "q4k".parse::<GGmlType>(),
        Err(GGmlTypeError::Name("q4k".into()))
    );
}

#[test]
fn test_dequantize_bytes() {
    use crate::DequantExt;

    let blocks = [
        Q4_0 {
            delta: 0x3c00,
            quants: [0x9a; 16],
        },
        Q4_0 {
            delta: 0xc000,
            quants: [0x07; 16],
        },
    ];
    let mut data = Vec::new();
    for blk in &blocks {
        blk.write_bytes(&mut data);
    }

    let expected = <Q4_0 as DequantExt<f32, 32>>::dequantize_vec(&blocks, 64).unwrap();
    let mut serial = [0.; 64];
    let mut parallel = [0.; 64];
    GGmlType::Q4_0.dequantize(&data, &mut serial).unwrap();
    GGmlType::Q4_0.par_dequantize(&data, &mut parallel).unwrap();
    assert_eq!(serial[..], expected[..]);
    assert_eq!(parallel[..], expected[..]);
    assert_eq!((serial[0], serial[16], serial[32]), (2., 1., 2.));

    let data = [0x00, 0x3c, 0x00, 0xc0];
    let mut dst = [0.; 2];
    GGmlType::F16.dequantize(&data, &mut dst).unwrap();
    assert_eq!(dst, [1., -2.]);
}

#[test]
fn test_dequantize_byte_count() {
    let data = vec![0u8; Q6K::SIZE + 1];
    let mut dst = [7.; 256];
    assert_eq!(
        GGmlType::Q6K.dequantize(&data, &mut dst),
        Err(InvalidLength::ByteCount {
            expected: 210,
            found: 211
        })
    );
    assert_eq!(
        GGmlType::Q6K.par_dequantize(&data[..210], &mut dst[..255]),
        Err(InvalidLength::Indivisible {
            elements: 255,
            block: 256
        })
    );
    assert!(dst.iter().all(|&x| x == 7.));
}

#[test]
fn test_decode_block_rejects_short_bytes() {
    let mut dst = [7.; 32];
    assert_eq!(
        decode_block::<Q8_0, 32>(&mut dst, &[0; 33]),
        Err(InvalidLength::ByteCount {
            expected: 34,
            found: 33
        })
    );
    assert!(dst.iter().all(|&x| x == 7.));
}
