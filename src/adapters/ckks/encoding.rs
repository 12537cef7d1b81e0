//! Canonical-embedding encoder.
//!
//! A vector of up to N/2 reals is placed in the slots of a complex vector,
//! mapped to polynomial coefficients by the inverse "special" FFT over the
//! primitive 2N-th roots ζ^(5^j), scaled by Δ and rounded. Slot j of a
//! plaintext m is m(ζ^(5^j)) / Δ, so the automorphism X -> X^5 rotates the
//! slots left by one.

use num_complex::Complex64;

use super::params::MAX_SCALED_MAGNITUDE;
use super::ring::{centered, from_signed, Poly};
use crate::domain::CryptoError;

/// Root-of-unity and rotation-group tables for one ring degree.
#[derive(Clone)]
pub struct Encoder {
    n: usize,
    /// ζ^j = exp(2πi·j / 2N) for j in 0..=2N
    ksi_pows: Vec<Complex64>,
    /// 5^j mod 2N for j < N/2
    rot_group: Vec<usize>,
}

impl Encoder {
    pub fn new(n: usize) -> Self {
        let m = 2 * n;
        let ksi_pows = (0..=m)
            .map(|j| Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI * j as f64 / m as f64))
            .collect();
        let mut rot_group = Vec::with_capacity(n / 2);
        let mut five = 1usize;
        for _ in 0..n / 2 {
            rot_group.push(five);
            five = five * 5 % m;
        }
        Self {
            n,
            ksi_pows,
            rot_group,
        }
    }

    pub fn slots(&self) -> usize {
        self.n / 2
    }

    /// Encode `values` at scale Δ.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` if `values` is empty, exceeds the slot
    /// count, or holds non-finite or oversized values.
    pub fn encode(&self, values: &[f64], scale: f64) -> Result<Poly, CryptoError> {
        if values.is_empty() {
            return Err(CryptoError::Encoding("cannot encode an empty vector".into()));
        }
        if values.len() > self.slots() {
            return Err(CryptoError::Encoding(format!(
                "{} values exceed the {} available slots",
                values.len(),
                self.slots()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(CryptoError::Encoding(format!(
                "component {pos} is not a finite number"
            )));
        }
        if let Some(pos) = values
            .iter()
            .position(|v| (v * scale).abs() >= MAX_SCALED_MAGNITUDE)
        {
            return Err(CryptoError::Encoding(format!(
                "component {pos} is too large for the ciphertext modulus at this scale"
            )));
        }

        let nh = self.slots();
        let mut z = vec![Complex64::new(0.0, 0.0); nh];
        for (slot, &v) in z.iter_mut().zip(values) {
            *slot = Complex64::new(v, 0.0);
        }
        self.fft_special_inv(&mut z);

        let mut coeffs = vec![0u64; self.n];
        for (i, c) in z.iter().enumerate() {
            coeffs[i] = from_signed((c.re * scale).round() as i64);
            coeffs[i + nh] = from_signed((c.im * scale).round() as i64);
        }
        Ok(Poly { coeffs })
    }

    /// Decode the first `len` slots of a plaintext at scale Δ.
    pub fn decode(&self, plain: &Poly, scale: f64, len: usize) -> Vec<f64> {
        let nh = self.slots();
        let mut z: Vec<Complex64> = (0..nh)
            .map(|i| {
                Complex64::new(
                    centered(plain.coeffs[i]) as f64 / scale,
                    centered(plain.coeffs[i + nh]) as f64 / scale,
                )
            })
            .collect();
        self.fft_special(&mut z);
        z.iter().take(len.min(nh)).map(|c| c.re).collect()
    }

    /// Galois element that rotates slots left by `steps`: 5^steps mod 2N.
    pub fn galois_element(&self, steps: usize) -> u64 {
        let m = 2 * self.n;
        let mut g = 1usize;
        for _ in 0..steps % self.slots() {
            g = g * 5 % m;
        }
        g as u64
    }

    fn fft_special(&self, v: &mut [Complex64]) {
        let size = v.len();
        let m = 2 * self.n;
        bit_reverse(v);
        let mut len = 2;
        while len <= size {
            let lenh = len >> 1;
            let lenq = len << 2;
            let gap = m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx = (self.rot_group[j] % lenq) * gap;
                    let u = v[i + j];
                    let w = v[i + j + lenh] * self.ksi_pows[idx];
                    v[i + j] = u + w;
                    v[i + j + lenh] = u - w;
                }
            }
            len <<= 1;
        }
    }

    fn fft_special_inv(&self, v: &mut [Complex64]) {
        let size = v.len();
        let m = 2 * self.n;
        let mut len = size;
        while len >= 1 {
            let lenh = len >> 1;
            let lenq = len << 2;
            let gap = m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx = (lenq - self.rot_group[j] % lenq) * gap;
                    let u = v[i + j] + v[i + j + lenh];
                    let w = (v[i + j] - v[i + j + lenh]) * self.ksi_pows[idx];
                    v[i + j] = u;
                    v[i + j + lenh] = w;
                }
            }
            len >>= 1;
        }
        bit_reverse(v);
        let inv = 1.0 / size as f64;
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder").field("slots", &self.slots()).finish()
    }
}

fn bit_reverse(v: &mut [Complex64]) {
    let n = v.len();
    if n < 2 {
        return;
    }
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            v.swap(i, j);
        }
    }
}
