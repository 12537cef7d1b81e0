//! Polynomial ring Z_q[X]/(X^N + 1) with NTT-based multiplication.
//!
//! Coefficients are kept canonical in [0, q). Multiplication uses the
//! negacyclic ("twisted") NTT: coefficients are scaled by powers of a
//! primitive 2N-th root ψ, transformed with the cyclic NTT over ω = ψ², and
//! untwisted after the inverse transform.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::params::Q;
use crate::domain::CryptoError;

#[inline]
pub(crate) fn add_mod(a: u64, b: u64) -> u64 {
    let s = a + b;
    if s >= Q {
        s - Q
    } else {
        s
    }
}

#[inline]
pub(crate) fn sub_mod(a: u64, b: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        a + Q - b
    }
}

#[inline]
pub(crate) fn mul_mod(a: u64, b: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(Q)) as u64
}

pub(crate) fn pow_mod(mut base: u64, mut exp: u64) -> u64 {
    let mut acc = 1u64;
    base %= Q;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base);
        }
        base = mul_mod(base, base);
        exp >>= 1;
    }
    acc
}

/// Modular inverse via Fermat (q is prime).
pub(crate) fn inv_mod(a: u64) -> u64 {
    pow_mod(a, Q - 2)
}

/// Reduce a signed integer into [0, q).
#[inline]
pub(crate) fn from_signed(v: i64) -> u64 {
    v.rem_euclid(Q as i64) as u64
}

/// Lift a canonical coefficient into the centered range (-q/2, q/2].
#[inline]
pub(crate) fn centered(c: u64) -> i64 {
    if c > Q / 2 {
        -((Q - c) as i64)
    } else {
        c as i64
    }
}

/// A polynomial in Z_q[X]/(X^N + 1).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Poly {
    pub coeffs: Vec<u64>,
}

impl Poly {
    /// Build from small signed coefficients (secrets, errors).
    pub fn from_signed(values: &[i64]) -> Self {
        Self {
            coeffs: values.iter().map(|&v| from_signed(v)).collect(),
        }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len()
    }

    /// True if every coefficient is canonical.
    pub fn is_reduced(&self) -> bool {
        self.coeffs.iter().all(|&c| c < Q)
    }

    pub fn add(&self, other: &Poly) -> Poly {
        Poly {
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| add_mod(a, b))
                .collect(),
        }
    }

    pub fn add_assign(&mut self, other: &Poly) {
        for (a, &b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a = add_mod(*a, b);
        }
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        Poly {
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| sub_mod(a, b))
                .collect(),
        }
    }

    pub fn neg(&self) -> Poly {
        Poly {
            coeffs: self.coeffs.iter().map(|&a| sub_mod(0, a)).collect(),
        }
    }

    /// Multiply every coefficient by a scalar mod q.
    pub fn scalar_mul(&self, k: u64) -> Poly {
        Poly {
            coeffs: self.coeffs.iter().map(|&a| mul_mod(a, k)).collect(),
        }
    }

    /// Apply the ring automorphism X -> X^k (k odd).
    ///
    /// Coefficient i moves to i·k mod 2N, negated when that lands in [N, 2N).
    pub fn automorphism(&self, k: u64) -> Poly {
        let n = self.coeffs.len() as u64;
        let two_n = 2 * n;
        let mut out = vec![0u64; self.coeffs.len()];
        for (i, &c) in self.coeffs.iter().enumerate() {
            let idx = (i as u64 * k) % two_n;
            if idx < n {
                out[idx as usize] = c;
            } else {
                out[(idx - n) as usize] = sub_mod(0, c);
            }
        }
        Poly { coeffs: out }
    }

    /// Digit `d` of the base-2^DECOMP_BITS gadget decomposition.
    pub fn digit(&self, d: usize, bits: u32, mask: u64) -> Poly {
        let shift = bits * d as u32;
        Poly {
            coeffs: self.coeffs.iter().map(|&c| (c >> shift) & mask).collect(),
        }
    }

    /// Largest centered coefficient magnitude.
    pub fn inf_norm(&self) -> u64 {
        self.coeffs
            .iter()
            .map(|&c| centered(c).unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for Poly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poly")
            .field("degree", &self.coeffs.len())
            .finish_non_exhaustive()
    }
}

/// Precomputed NTT tables for one ring degree.
#[derive(Clone)]
pub struct RingContext {
    n: usize,
    log_n: u32,
    omega: u64,
    omega_inv: u64,
    /// ψ^i
    psi_pows: Vec<u64>,
    /// n⁻¹ · ψ^{-i}
    psi_inv_pows_scaled: Vec<u64>,
}

impl RingContext {
    /// Build tables for degree `n`.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` if `n` is not a power of two
    /// or q has no primitive 2n-th root of unity.
    pub fn new(n: usize) -> Result<Self, CryptoError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(CryptoError::InvalidParameters(format!(
                "ring degree {n} is not a power of two"
            )));
        }
        let two_n = 2 * n as u64;
        if (Q - 1) % two_n != 0 {
            return Err(CryptoError::InvalidParameters(format!(
                "modulus does not support ring degree {n}"
            )));
        }

        let psi = find_primitive_root(n).ok_or_else(|| {
            CryptoError::InvalidParameters(format!("no primitive {two_n}-th root of unity"))
        })?;
        let psi_inv = inv_mod(psi);
        let n_inv = inv_mod(n as u64);

        let mut psi_pows = Vec::with_capacity(n);
        let mut psi_inv_pows_scaled = Vec::with_capacity(n);
        let (mut p, mut pi) = (1u64, n_inv);
        for _ in 0..n {
            psi_pows.push(p);
            psi_inv_pows_scaled.push(pi);
            p = mul_mod(p, psi);
            pi = mul_mod(pi, psi_inv);
        }

        let omega = mul_mod(psi, psi);
        Ok(Self {
            n,
            log_n: n.trailing_zeros(),
            omega,
            omega_inv: inv_mod(omega),
            psi_pows,
            psi_inv_pows_scaled,
        })
    }

    pub fn degree(&self) -> usize {
        self.n
    }

    /// Coefficient form to evaluation form.
    pub fn forward(&self, p: &Poly) -> Vec<u64> {
        let mut a: Vec<u64> = p
            .coeffs
            .iter()
            .zip(&self.psi_pows)
            .map(|(&c, &w)| mul_mod(c, w))
            .collect();
        self.ntt_cyclic(&mut a, self.omega);
        a
    }

    /// Evaluation form back to coefficient form.
    pub fn inverse(&self, mut a: Vec<u64>) -> Poly {
        self.ntt_cyclic(&mut a, self.omega_inv);
        for (c, &w) in a.iter_mut().zip(&self.psi_inv_pows_scaled) {
            *c = mul_mod(*c, w);
        }
        Poly { coeffs: a }
    }

    /// Negacyclic product a·b.
    pub fn mul(&self, a: &Poly, b: &Poly) -> Poly {
        let fa = self.forward(a);
        let fb = self.forward(b);
        self.inverse(pointwise_mul(&fa, &fb))
    }

    /// Iterative Cooley-Tukey over `root` (an n-th root of unity).
    fn ntt_cyclic(&self, a: &mut [u64], root: u64) {
        let n = self.n;
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - self.log_n);
            if i < j {
                a.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let w_len = pow_mod(root, (n / len) as u64);
            let half = len / 2;
            for start in (0..n).step_by(len) {
                let mut w = 1u64;
                for j in 0..half {
                    let u = a[start + j];
                    let v = mul_mod(a[start + j + half], w);
                    a[start + j] = add_mod(u, v);
                    a[start + j + half] = sub_mod(u, v);
                    w = mul_mod(w, w_len);
                }
            }
            len <<= 1;
        }
    }
}

pub fn pointwise_mul(a: &[u64], b: &[u64]) -> Vec<u64> {
    a.iter().zip(b).map(|(&x, &y)| mul_mod(x, y)).collect()
}

pub fn pointwise_mul_acc(acc: &mut [u64], a: &[u64], b: &[u64]) {
    for ((c, &x), &y) in acc.iter_mut().zip(a).zip(b) {
        *c = add_mod(*c, mul_mod(x, y));
    }
}

impl std::fmt::Debug for RingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingContext").field("n", &self.n).finish()
    }
}

/// Smallest ψ = g^((q-1)/2n) with ψ^n = -1, trying g = 2, 3, ...
fn find_primitive_root(n: usize) -> Option<u64> {
    let exp = (Q - 1) / (2 * n as u64);
    (2u64..10_000)
        .map(|g| pow_mod(g, exp))
        .find(|&psi| pow_mod(psi, n as u64) == Q - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn naive_mul(a: &Poly, b: &Poly) -> Poly {
        let n = a.degree();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = mul_mod(a.coeffs[i], b.coeffs[j]);
                let k = i + j;
                if k < n {
                    out[k] = add_mod(out[k], prod);
                } else {
                    out[k - n] = sub_mod(out[k - n], prod);
                }
            }
        }
        Poly { coeffs: out }
    }

    fn random_poly(rng: &mut StdRng, n: usize) -> Poly {
        Poly {
            coeffs: (0..n).map(|_| rng.gen_range(0..Q)).collect(),
        }
    }

    #[test]
    fn ntt_matches_naive_negacyclic_product() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [16usize, 64] {
            let ring = RingContext::new(n).expect("ring");
            let a = random_poly(&mut rng, n);
            let b = random_poly(&mut rng, n);
            assert_eq!(ring.mul(&a, &b), naive_mul(&a, &b), "n = {n}");
        }
    }

    #[test]
    fn forward_inverse_roundtrip() {
        let mut rng = StdRng::seed_from_u64(11);
        let ring = RingContext::new(4096).expect("ring");
        let a = random_poly(&mut rng, 4096);
        assert_eq!(ring.inverse(ring.forward(&a)), a);
    }

    #[test]
    fn x_to_the_n_is_minus_one() {
        let n = 32;
        let ring = RingContext::new(n).expect("ring");
        let monomial = |k: usize| {
            let mut coeffs = vec![0u64; n];
            coeffs[k] = 1;
            Poly { coeffs }
        };
        let x = monomial(1);
        let x_n_minus_1 = monomial(n - 1);
        let prod = ring.mul(&x, &x_n_minus_1);
        assert_eq!(prod.coeffs[0], Q - 1);
        assert!(prod.coeffs[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(RingContext::new(3000).is_err());
    }

    #[test]
    fn automorphism_composes() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_poly(&mut rng, 64);
        // X -> X^5 -> X^125
        let composed = a.automorphism(5).automorphism(25);
        assert_eq!(composed, a.automorphism(125));
    }

    #[test]
    fn centered_lift() {
        assert_eq!(centered(from_signed(-5)), -5);
        assert_eq!(centered(from_signed(17)), 17);
        assert_eq!(Poly::from_signed(&[-3, 2]).inf_norm(), 3);
    }
}
