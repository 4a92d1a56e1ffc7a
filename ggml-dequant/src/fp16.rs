//! Software half-precision conversions.
//!
//! Everything here works on raw bit patterns through [`f32::from_bits`] and
//! [`f32::to_bits`], so the results are identical on targets with and without
//! native binary16 support.

/// Converts a binary16 bit pattern to `f32`.
///
/// Normals, subnormals, signed zeros and infinities convert exactly; NaN stays NaN.
#[inline]
pub fn half_to_float(h: u16) -> f32 {
    let w = (h as u32) << 16;
    let sign = w & 0x8000_0000;
    let two_w = w << 1;

    // re-bias the exponent by 2^112 after moving it into f32 position
    const EXP_OFFSET: u32 = 0xe0 << 23;
    let exp_scale = f32::from_bits(0x0780_0000);
    let normalized = f32::from_bits((two_w >> 4) + EXP_OFFSET) * exp_scale;

    // subnormals: place the mantissa under a 0.5 exponent and subtract it back
    const MAGIC_MASK: u32 = 126 << 23;
    const MAGIC_BIAS: f32 = 0.5;
    let denormalized = f32::from_bits((two_w >> 17) | MAGIC_MASK) - MAGIC_BIAS;

    const DENORMALIZED_CUTOFF: u32 = 1 << 27;
    let bits = if two_w < DENORMALIZED_CUTOFF {
        denormalized.to_bits()
    } else {
        normalized.to_bits()
    };
    f32::from_bits(sign | bits)
}

/// Converts an `f32` to a binary16 bit pattern, rounding to nearest even.
///
/// Values beyond the binary16 range saturate to infinity. Every NaN becomes
/// the quiet NaN `0x7e00` with its sign kept.
#[inline]
pub fn float_to_half(f: f32) -> u16 {
    let scale_to_inf = f32::from_bits(0x7780_0000);
    let scale_to_zero = f32::from_bits(0x0880_0000);
    let mut base = (f.abs() * scale_to_inf) * scale_to_zero;

    let w = f.to_bits();
    let shl1_w = w << 1;
    let sign = w & 0x8000_0000;
    let bias = (shl1_w & 0xff00_0000).max(0x7100_0000);

    base += f32::from_bits((bias >> 1) + 0x0780_0000);
    let bits = base.to_bits();
    let exp_bits = (bits >> 13) & 0x0000_7c00;
    let mantissa_bits = bits & 0x0000_0fff;
    let nonsign = exp_bits + mantissa_bits;

    let magnitude = if shl1_w > 0xff00_0000 {
        0x7e00
    } else {
        nonsign
    };
    ((sign >> 16) | magnitude) as u16
}

/// Reconstructs half of the value of an E8M0 exponent-only scale, `2^(x - 128)`.
///
/// The two smallest codes fall below the normal `f32` range and map to subnormals.
#[inline]
pub fn e8m0_to_float_half(x: u8) -> f32 {
    let bits = if x < 2 {
        0x0020_0000 << x
    } else {
        ((x - 1) as u32) << 23
    };
    f32::from_bits(bits)
}

/// Widens a bfloat16 bit pattern to `f32`.
#[inline]
pub fn bf16_to_float(b: u16) -> f32 {
    f32::from_bits((b as u32) << 16)
}

#[test]
fn test_half_fixed_points() {
    assert_eq!(half_to_float(0x3c00), 1.);
    assert_eq!(half_to_float(0x0000).to_bits(), 0);
    assert_eq!(half_to_float(0x8000).to_bits(), 0x8000_0000);
    assert_eq!(half_to_float(0xc000), -2.);
    assert_eq!(half_to_float(0x7c00), f32::INFINITY);
    assert_eq!(half_to_float(0xfc00), f32::NEG_INFINITY);
    assert!(half_to_float(0x7e00).is_nan());
    assert_eq!(half_to_float(0x7bff), 65504.);
    // smallest subnormal and smallest normal
    assert_eq!(half_to_float(0x0001), 2f32.powi(-24));
    assert_eq!(half_to_float(0x0400), 2f32.powi(-14));
    assert_eq!(half_to_float(0x3555), 0.333_251_95);
}

#[test]
fn test_half_exhaustive_against_half_crate() {
    for h in 0..=u16::MAX {
        let ours = half_to_float(h);
        let reference = half::f16::from_bits(h).to_f32();
        if reference.is_nan() {
            assert!(ours.is_nan(), "{h:#06x}");
            assert_eq!(ours.is_sign_negative(), reference.is_sign_negative());
        } else {
            assert_eq!(ours.to_bits(), reference.to_bits(), "{h:#06x}");
            assert_eq!(float_to_half(ours), h, "{h:#06x}");
        }
    }
}

#[test]
fn test_float_to_half_special() {
    assert_eq!(float_to_half(1.), 0x3c00);
    assert_eq!(float_to_half(-2.), 0xc000);
    assert_eq!(float_to_half(0.), 0x0000);
    assert_eq!(float_to_half(-0.), 0x8000);
    assert_eq!(float_to_half(65504.), 0x7bff);
    assert_eq!(float_to_half(1e6), 0x7c00);
    assert_eq!(float_to_half(-1e6), 0xfc00);
    assert_eq!(float_to_half(f32::INFINITY), 0x7c00);
    assert_eq!(float_to_half(f32::NAN) & 0x7fff, 0x7e00);
    assert_eq!(float_to_half(1e-10), 0x0000);
    // ties go to even: 1 + 2^-11 sits halfway between 0x3c00 and 0x3c01
    assert_eq!(float_to_half(1. + 2f32.powi(-11)), 0x3c00);
    assert_eq!(float_to_half(1. + 3. * 2f32.powi(-11)), 0x3c02);
}

#[test]
fn test_float_to_half_random() {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    for _ in 0..100_000 {
        let f = f32::from_bits(rng.gen());
        let ours = float_to_half(f);
        let reference = half::f16::from_f32(f);
        if f.is_nan() {
            assert!(reference.is_nan());
            assert_eq!(ours & 0x7fff, 0x7e00);
        } else {
            assert_eq!(ours, reference.to_bits(), "{f:e}");
        }
    }
}

#[test]
fn test_half_round_trip_within_ulp() {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    for _ in 0..100_000 {
        let f: f32 = rng.gen_range(-65504.0..65504.0);
        let back = half_to_float(float_to_half(f));
        // binary16 keeps 10 explicit mantissa bits; below 2^-14 the spacing is fixed
        let ulp = if f.abs() < 2f32.powi(-14) {
            2f32.powi(-24)
        } else {
            2f32.powi(f.abs().log2().floor() as i32 - 10)
        };
        assert!((back - f).abs() <= ulp, "{f} -> {back}");
    }
}

#[test]
fn test_e8m0() {
    assert_eq!(e8m0_to_float_half(0).to_bits(), 0x0020_0000);
    assert_eq!(e8m0_to_float_half(1).to_bits(), 0x0040_0000);
    assert_eq!(e8m0_to_float_half(2), 2f32.powi(-126));
    assert_eq!(e8m0_to_float_half(127), 0.5);
    assert_eq!(e8m0_to_float_half(128), 1.);
    assert_eq!(e8m0_to_float_half(129), 2.);
    assert_eq!(e8m0_to_float_half(255), 2f32.powi(127));
    for x in 0..=u8::MAX {
        assert_eq!(e8m0_to_float_half(x), 2f64.powi(x as i32 - 128) as f32);
    }
}

#[test]
fn test_bf16() {
    assert_eq!(bf16_to_float(0x3f80), 1.);
    assert_eq!(bf16_to_float(0xc000), -2.);
    assert_eq!(bf16_to_float(0x7f80), f32::INFINITY);
}
