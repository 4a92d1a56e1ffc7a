//! Bit-exact dequantization of GGML quantized tensor blocks.
//!
//! Every block format is a plain struct read from its little-endian byte layout
//! with [`DataBlock::from_bytes`]. A block expands to `N` values through
//! [`Dequantize`], and whole rows of blocks expand through [`DequantExt`] or,
//! straight from raw bytes, through [`GGmlType::dequantize`].

use rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use std::{error::Error, fmt, iter::zip};

pub mod fp16;
mod structs;
mod types;

#[cfg(test)]
mod test_utils;

pub use ::half::{bf16, f16};
pub use structs::*;
pub use types::{GGmlType, GGmlTypeError, GGmlTypeSize};

/// A fixed-size unit of encoded elements.
pub trait DataBlock: Sized + 'static {
    /// Number of elements one block decodes to.
    const COUNT: usize;
    /// Number of bytes one block occupies in its serialized layout.
    const SIZE: usize;
    /// The block whose every element decodes to zero.
    const ZEROS: Self;

    /// Reads a block from exactly [`Self::SIZE`] bytes.
    ///
    /// Returns `None` if `bytes` has any other length.
    fn from_bytes(bytes: &[u8]) -> Option<Self>;

    /// Appends the serialized layout of this block to `buf`.
    fn write_bytes(&self, buf: &mut Vec<u8>);
}

pub trait Dequantize<T, const N: usize>: DataBlock {
    fn dequantize(&self) -> [T; N];
}

impl<Blk, const N: usize> Dequantize<f16, N> for Blk
where
    Blk: Dequantize<f32, N>,
{
    #[inline]
    fn dequantize(&self) -> [f16; N] {
        <Self as Dequantize<f32, N>>::dequantize(self)
            .map(|x| f16::from_bits(fp16::float_to_half(x)))
    }
}

impl<Blk, const N: usize> Dequantize<bf16, N> for Blk
where
    Blk: Dequantize<f32, N>,
{
    #[inline]
    fn dequantize(&self) -> [bf16; N] {
        <Self as Dequantize<f32, N>>::dequantize(self).map(bf16::from_f32)
    }
}

/// Row-level decoding over a sequence of blocks.
pub trait DequantExt<T, const N: usize>: Sized {
    /// Decodes `src` into `dst`, which must hold exactly `src.len() * N` values.
    fn dequantize_slice(dst: &mut [T], src: &[Self]) -> Result<(), InvalidLength>;
    /// Same as [`dequantize_slice`](Self::dequantize_slice), with blocks spread across the rayon pool.
    fn par_dequantize_slice(dst: &mut [T], src: &[Self]) -> Result<(), InvalidLength>;
    /// Decodes `src` into a new vector of `total` values.
    fn dequantize_vec(src: &[Self], total: usize) -> Result<Vec<T>, InvalidLength>;
}

impl<Blk, T, const N: usize> DequantExt<T, N> for Blk
where
    Blk: Dequantize<T, N> + Sync,
    T: Copy + Default + Send,
{
    fn dequantize_slice(dst: &mut [T], src: &[Self]) -> Result<(), InvalidLength> {
        check_blocks(dst.len(), N, src.len())?;
        for (dst, blk) in zip(dst.chunks_exact_mut(N), src) {
            dst.copy_from_slice(&Dequantize::<T, N>::dequantize(blk))
        }
        Ok(())
    }

    fn par_dequantize_slice(dst: &mut [T], src: &[Self]) -> Result<(), InvalidLength> {
        check_blocks(dst.len(), N, src.len())?;
        dst.par_chunks_exact_mut(N)
            .zip(src.par_iter())
            .for_each(|(dst, blk)| {
                dst.copy_from_slice(&Dequantize::<T, N>::dequantize(blk))
            });
        Ok(())
    }

    fn dequantize_vec(src: &[Self], total: usize) -> Result<Vec<T>, InvalidLength> {
        check_blocks(total, N, src.len())?;
        let mut ans = vec![T::default(); total];
        Self::dequantize_slice(&mut ans, src)?;
        Ok(ans)
    }
}

/// The requested element count does not fit the supplied blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum InvalidLength {
    /// `elements` is not a multiple of the block element count.
    Indivisible { elements: usize, block: usize },
    /// The block sequence does not hold exactly the requested elements.
    BlockCount { expected: usize, found: usize },
    /// The serialized data does not hold exactly the requested blocks.
    ByteCount { expected: usize, found: usize },
    /// The byte count of `elements` values does not fit in `usize`.
    Overflow { elements: usize },
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indivisible { elements, block } => {
                write!(f, "{elements} elements is not a multiple of block size {block}")
            }
            Self::BlockCount { expected, found } => {
                write!(f, "expected {expected} blocks, found {found}")
            }
            Self::ByteCount { expected, found } => {
                write!(f, "expected {expected} bytes, found {found}")
            }
            Self::Overflow { elements } => {
                write!(f, "{elements} elements overflow the addressable byte count")
            }
        }
    }
}

impl Error for InvalidLength {}

/// Returns the block count covering `elements`, checking it against `found` blocks.
fn check_blocks(elements: usize, block: usize, found: usize) -> Result<usize, InvalidLength> {
    if elements % block != 0 {
        return Err(InvalidLength::Indivisible { elements, block });
    }
    let expected = elements / block;
    if found != expected {
        return Err(InvalidLength::BlockCount { expected, found });
    }
    Ok(expected)
}

/// Sequential little-endian field reader over one serialized block.
struct Fields<'a>(&'a [u8]);

impl<'a> Fields<'a> {
    #[inline]
    fn new(bytes: &'a [u8], size: usize) -> Option<Self> {
        (bytes.len() == size).then_some(Self(bytes))
    }

    #[inline]
    fn bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, tail) = self.0.split_first_chunk::<N>()?;
        self.0 = tail;
        Some(*head)
    }

    #[inline]
    fn u8(&mut self) -> Option<u8> {
        self.bytes::<1>().map(|[x]| x)
    }

    #[inline]
    fn u16(&mut self) -> Option<u16> {
        self.bytes().map(u16::from_le_bytes)
    }

    #[inline]
    fn f32(&mut self) -> Option<f32> {
        self.bytes().map(f32::from_le_bytes)
    }

    #[inline]
    fn i8s<const N: usize>(&mut self) -> Option<[i8; N]> {
        self.bytes::<N>().map(|bytes| bytes.map(|b| b as i8))
    }

    fn i16s<const N: usize>(&mut self) -> Option<[i16; N]> {
        let mut ans = [0; N];
        for x in &mut ans {
            *x = i16::from_le_bytes(self.bytes()?);
        }
        Some(ans)
    }
}

const _1: usize = 1;
const _32: usize = 32;
const _256: usize = 256;

#[test]
fn test_length_contract_leaves_output_untouched() {
    const SENTINEL: f32 = 42.;

    let blocks = [Q4_0::ZEROS, Q4_0::ZEROS];
    let mut dst = [SENTINEL; 63];
    assert_eq!(
        <Q4_0 as DequantExt<f32, _32>>::dequantize_slice(&mut dst, &blocks),
        Err(InvalidLength::Indivisible {
            elements: 63,
            block: 32
        })
    );
    assert!(dst.iter().all(|&x| x == SENTINEL));

    let mut dst = [SENTINEL; 96];
    assert_eq!(
        <Q4_0 as DequantExt<f32, _32>>::par_dequantize_slice(&mut dst, &blocks),
        Err(InvalidLength::BlockCount {
            expected: 3,
            found: 2
        })
    );
    assert!(dst.iter().all(|&x| x == SENTINEL));

    let blocks = [Q6K::ZEROS];
    let mut dst = [SENTINEL; 300];
    assert!(<Q6K as DequantExt<f32, _256>>::dequantize_slice(&mut dst, &blocks).is_err());
    assert!(dst.iter().all(|&x| x == SENTINEL));

    assert_eq!(
        <Q8K as DequantExt<f32, _256>>::dequantize_vec(&[], 0),
        Ok(vec![])
    );
}

#[test]
fn test_every_type_rejects_partial_blocks() {
    const SENTINEL: f32 = 42.;

    for ty in GGmlType::ALL {
        let GGmlTypeSize {
            block_size,
            type_size,
        } = ty.size();
        let block = block_size as usize;
        if block == 1 {
            continue;
        }
        let data = vec![0u8; type_size as usize];
        let expected = Err(InvalidLength::Indivisible {
            elements: block + 1,
            block,
        });

        let mut dst = vec![SENTINEL; block + 1];
        assert_eq!(ty.dequantize(&data, &mut dst), expected, "{ty}");
        assert_eq!(ty.par_dequantize(&data, &mut dst), expected, "{ty}");
        assert!(dst.iter().all(|&x| x == SENTINEL), "{ty}");

        let mut dst = vec![SENTINEL; block];
        assert_eq!(
            ty.dequantize(&data[1..], &mut dst),
            Err(InvalidLength::ByteCount {
                expected: type_size as usize,
                found: type_size as usize - 1
            }),
            "{ty}"
        );
        assert!(dst.iter().all(|&x| x == SENTINEL), "{ty}");
    }
}

#[test]
fn test_serial_and_parallel_agree() {
    use crate::test_utils::random_blocks;

    let blocks = random_blocks::<Q5K>(64);
    let mut serial = vec![0.; 64 * _256];
    let mut parallel = vec![0.; 64 * _256];
    <Q5K as DequantExt<f32, _256>>::dequantize_slice(&mut serial, &blocks).unwrap();
    <Q5K as DequantExt<f32, _256>>::par_dequantize_slice(&mut parallel, &blocks).unwrap();
    assert!(zip(&serial, &parallel).all(|(a, b)| a.to_bits() == b.to_bits()));

    let again = <Q5K as DequantExt<f32, _256>>::dequantize_vec(&blocks, 64 * _256).unwrap();
    assert!(zip(&serial, &again).all(|(a, b)| a.to_bits() == b.to_bits()));
}

#[test]
fn test_half_outputs() {
    use crate::test_utils::{random_blocks, random_half};

    for mut blk in random_blocks::<Q8_0>(16) {
        blk.delta = random_half();
        let wide = <Q8_0 as Dequantize<f32, _32>>::dequantize(&blk);
        let narrow = <Q8_0 as Dequantize<f16, _32>>::dequantize(&blk);
        let brain = <Q8_0 as Dequantize<bf16, _32>>::dequantize(&blk);
        for i in 0.._32 {
            assert_eq!(narrow[i], f16::from_f32(wide[i]));
            assert_eq!(brain[i], bf16::from_f32(wide[i]));
        }
    }
}

#[test]
fn test_fields() {
    let bytes = [0x00, 0x3c, 0xff, 0x34, 0x12, 0x00, 0x00, 0x80, 0x3f];
    let mut fields = Fields::new(&bytes, bytes.len()).unwrap();
    assert_eq!(fields.u16(), Some(0x3c00));
    assert_eq!(fields.i8s::<1>(), Some([-1]));
    assert_eq!(fields.i16s::<1>(), Some([0x1234]));
    assert_eq!(fields.f32(), Some(1.));
    assert_eq!(fields.u8(), None);
    assert!(Fields::new(&bytes, 8).is_none());
}
