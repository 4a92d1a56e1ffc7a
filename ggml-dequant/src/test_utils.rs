use crate::{fp16::float_to_half, DataBlock};
use rand::Rng;

/// Blocks filled with random bytes.
///
/// Scale fields may hold NaN or infinity; tests comparing values override them.
pub(crate) fn random_blocks<B: DataBlock>(n: usize) -> Vec<B> {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; B::SIZE];
    (0..n)
        .map(|_| {
            rng.fill(&mut bytes[..]);
            B::from_bytes(&bytes).unwrap()
        })
        .collect()
}

/// A finite binary16 bit pattern in `(-1, 1)`.
pub(crate) fn random_half() -> u16 {
    float_to_half(rand::thread_rng().gen_range(-1.0..1.0))
}

/// Packs 6-bit scales and mins the way `Q4K` and `Q5K` store them.
pub(crate) fn pack_scale_min_k4(scales: [u8; 8], mins: [u8; 8]) -> [u8; 12] {
    let mut q = [0; 12];
    for j in 0..4 {
        q[j] = (scales[j] & 63) | ((scales[j + 4] >> 4) << 6);
        q[j + 4] = (mins[j] & 63) | ((mins[j + 4] >> 4) << 6);
        q[j + 8] = (scales[j + 4] & 0xf) | ((mins[j + 4] & 0xf) << 4);
    }
    q
}
