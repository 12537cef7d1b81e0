//! Fixed scheme constants shared by every ring degree.

/// Ciphertext modulus: the 60-bit NTT prime 2^60 - 2^18 + 1.
///
/// q ≡ 1 (mod 2^18), so primitive 2N-th roots of unity exist for every
/// supported degree N ≤ 2^17.
pub const Q: u64 = 0x0FFF_FFFF_FFFC_0001;

/// Standard deviation of the error distribution.
pub const SIGMA: f64 = 3.2;

/// Gaussian samples beyond this many standard deviations are rejected.
pub const TAIL_SIGMAS: f64 = 6.0;

/// Bits per digit of the gadget decomposition used for key switching.
pub const DECOMP_BITS: u32 = 10;

/// Mask extracting one decomposition digit.
pub const DECOMP_MASK: u64 = (1 << DECOMP_BITS) - 1;

/// Digits needed to cover a coefficient in [0, Q).
pub const NUM_DIGITS: usize = 6;

/// Largest scaled slot magnitude accepted by the encoder (Q / 4), leaving the
/// upper half of the centered range for noise.
pub const MAX_SCALED_MAGNITUDE: f64 = (Q / 4) as f64;

/// Scaled slot magnitude at which evaluated results would wrap mod Q.
pub const WRAP_MAGNITUDE: f64 = (Q / 2) as f64;
