//! Homomorphic scheme parameters.
//!
//! A `SchemeConfig` is chosen once per deployment and threaded explicitly into
//! every context-creation and deserialization call. A ciphertext can only be
//! decrypted by a context built from an identical configuration.

use serde::{Deserialize, Serialize};

use super::CryptoError;

/// Smallest ring degree accepted.
///
/// The ciphertext modulus is a single 60-bit prime; the homomorphic encryption
/// security standard requires N >= 4096 for 128-bit security at that size.
pub const MIN_POLY_MODULUS_DEGREE: usize = 4096;

/// Largest ring degree accepted (NTT prime supports 2N up to 2^17).
pub const MAX_POLY_MODULUS_DEGREE: usize = 32768;

/// Largest global scale, in bits. Keeps at least 2^9 of headroom for encoded values.
pub const MAX_SCALE_BITS: u32 = 50;

/// Default scale used by [`SchemeConfig::default`].
pub const DEFAULT_SCALE_BITS: u32 = 40;

/// Fixed parameters of the CKKS-style scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// Ring degree N of Z_q[X]/(X^N + 1). Power of two.
    pub polynomial_modulus_degree: usize,

    /// Scaling factor applied to real values before rounding (e.g. 2^40).
    pub global_scale: f64,

    /// Whether contexts carry Galois keys for slot rotations.
    pub galois_keys_enabled: bool,
}

impl SchemeConfig {
    /// Create a configuration. Call [`SchemeConfig::validate`] before use.
    #[must_use]
    pub fn new(polynomial_modulus_degree: usize, global_scale: f64, galois_keys_enabled: bool) -> Self {
        Self {
            polynomial_modulus_degree,
            global_scale,
            galois_keys_enabled,
        }
    }

    /// Create a configuration whose global scale is `2^scale_bits`.
    #[must_use]
    pub fn with_scale_bits(
        polynomial_modulus_degree: usize,
        scale_bits: u32,
        galois_keys_enabled: bool,
    ) -> Self {
        Self::new(
            polynomial_modulus_degree,
            2f64.powi(scale_bits as i32),
            galois_keys_enabled,
        )
    }

    /// Number of real values one ciphertext can pack (N / 2).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.polynomial_modulus_degree / 2
    }

    /// Check the parameters against the scheme's limits.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` describing the first violation.
    pub fn validate(&self) -> Result<(), CryptoError> {
        let n = self.polynomial_modulus_degree;
        if !n.is_power_of_two() {
            return Err(CryptoError::InvalidParameters(format!(
                "polynomial modulus degree {n} is not a power of two"
            )));
        }
        if !(MIN_POLY_MODULUS_DEGREE..=MAX_POLY_MODULUS_DEGREE).contains(&n) {
            return Err(CryptoError::InvalidParameters(format!(
                "polynomial modulus degree {n} outside [{MIN_POLY_MODULUS_DEGREE}, {MAX_POLY_MODULUS_DEGREE}]"
            )));
        }
        if !self.global_scale.is_finite() || self.global_scale <= 1.0 {
            return Err(CryptoError::InvalidParameters(format!(
                "global scale {} must be a finite value greater than 1",
                self.global_scale
            )));
        }
        if self.global_scale > 2f64.powi(MAX_SCALE_BITS as i32) {
            return Err(CryptoError::InvalidParameters(format!(
                "global scale {} exceeds 2^{MAX_SCALE_BITS}",
                self.global_scale
            )));
        }
        Ok(())
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self::with_scale_bits(8192, DEFAULT_SCALE_BITS, true)
    }
}
