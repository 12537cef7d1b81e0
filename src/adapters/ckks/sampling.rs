//! Random sampling: uniform, seed-expanded uniform, ternary and discrete Gaussian.
//!
//! Uniform "a" polynomials in public and Galois keys are stored as 32-byte
//! seeds and re-expanded with ChaCha20, which keeps serialized contexts small.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::params::{Q, SIGMA, TAIL_SIGMAS};
use super::ring::Poly;

/// Polynomial with coefficients uniform in [0, q).
pub fn sample_uniform<R: Rng>(rng: &mut R, n: usize) -> Poly {
    Poly {
        coeffs: (0..n).map(|_| rng.gen_range(0..Q)).collect(),
    }
}

/// Deterministically expand `seed` into `count` uniform polynomials.
pub fn expand_seed(seed: &[u8; 32], n: usize, count: usize) -> Vec<Poly> {
    let mut rng = ChaCha20Rng::from_seed(*seed);
    (0..count).map(|_| sample_uniform(&mut rng, n)).collect()
}

/// Ternary coefficients: P(0) = 1/2, P(-1) = P(1) = 1/4.
pub fn sample_ternary<R: Rng>(rng: &mut R, n: usize) -> Vec<i8> {
    (0..n)
        .map(|_| match rng.gen_range(0u8..4) {
            0 => -1,
            1 => 1,
            _ => 0,
        })
        .collect()
}

/// Largest accepted |e| for a Gaussian sample.
pub fn gaussian_tail_bound() -> i64 {
    (SIGMA * TAIL_SIGMAS).ceil() as i64
}

/// Rounded Gaussian with σ = SIGMA via Box-Muller, rejecting the 6σ tail.
pub fn sample_gaussian<R: Rng>(rng: &mut R, n: usize) -> Vec<i64> {
    let bound = gaussian_tail_bound();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let r = (-2.0 * u1.ln()).sqrt() * SIGMA;
        for z in [r * u2.cos(), r * u2.sin()] {
            let s = z.round() as i64;
            if s.abs() <= bound && out.len() < n {
                out.push(s);
            }
        }
    }
    out
}

/// Gaussian error polynomial.
pub fn sample_error<R: Rng>(rng: &mut R, n: usize) -> Poly {
    Poly::from_signed(&sample_gaussian(rng, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn uniform_is_reduced() {
        let p = sample_uniform(&mut test_rng(), 1024);
        assert_eq!(p.degree(), 1024);
        assert!(p.is_reduced());
    }

    #[test]
    fn seed_expansion_is_deterministic() {
        let seed = [9u8; 32];
        let a = expand_seed(&seed, 256, 3);
        let b = expand_seed(&seed, 256, 3);
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
        assert_ne!(a[0], expand_seed(&[8u8; 32], 256, 1)[0]);
    }

    #[test]
    fn ternary_values_in_range() {
        let s = sample_ternary(&mut test_rng(), 4096);
        assert!(s.iter().all(|&c| (-1..=1).contains(&c)));
        let zeros = s.iter().filter(|&&c| c == 0).count();
        assert!((1700..2400).contains(&zeros), "zeros = {zeros}");
    }

    #[test]
    fn gaussian_respects_tail_and_spread() {
        let e = sample_gaussian(&mut test_rng(), 8192);
        assert_eq!(e.len(), 8192);
        assert!(e.iter().all(|&x| x.abs() <= gaussian_tail_bound()));
        let var = e.iter().map(|&x| (x * x) as f64).sum::<f64>() / e.len() as f64;
        assert!((7.0..14.0).contains(&var), "variance = {var}");
    }
}
