//! Ciphertexts and the raw homomorphic operations on them.
//!
//! A ciphertext is a pair (c0, c1) with c0 + c1·s ≈ Δ·m. It records the
//! key id of the public key it was encrypted under, the number of
//! meaningful slots, and an upper bound on the magnitude of any slot value.
//! Operations propagate the bound so callers can refuse results that would
//! wrap around the modulus.

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::framing::{frame, unframe};
use super::keys::{GaloisKey, PublicKey, SecretKey};
use super::params::{DECOMP_BITS, DECOMP_MASK};
use super::ring::{pointwise_mul_acc, Poly, RingContext};
use super::sampling::{sample_error, sample_ternary};
use crate::domain::CryptoError;

const CIPHERTEXT_MAGIC: &[u8; 4] = b"FCVC";

#[derive(Clone, PartialEq)]
pub struct Ciphertext {
    pub key_id: [u8; 32],
    /// Number of meaningful slots.
    pub len: usize,
    /// Upper bound on |slot value|, before scaling.
    pub bound: f64,
    pub c0: Poly,
    pub c1: Poly,
}

#[derive(Serialize)]
struct CiphertextWireRef<'a> {
    key_id: &'a [u8; 32],
    degree: u32,
    len: u32,
    bound: f64,
    c0: &'a [u64],
    c1: &'a [u64],
}

#[derive(Deserialize)]
struct CiphertextWire {
    key_id: [u8; 32],
    degree: u32,
    len: u32,
    bound: f64,
    c0: Vec<u64>,
    c1: Vec<u64>,
}

impl Ciphertext {
    pub fn degree(&self) -> usize {
        self.c0.degree()
    }

    /// # Errors
    /// Returns `CryptoError::Serialization` if bincode fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let wire = CiphertextWireRef {
            key_id: &self.key_id,
            degree: self.degree() as u32,
            len: self.len as u32,
            bound: self.bound,
            c0: &self.c0.coeffs,
            c1: &self.c1.coeffs,
        };
        let body = bincode::serialize(&wire)
            .map_err(|e| CryptoError::Serialization(format!("Failed to serialize ciphertext: {e}")))?;
        Ok(frame(CIPHERTEXT_MAGIC, 0, &body))
    }

    /// Parse without any context ("lazy" form). Shape is checked, key
    /// binding is not.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` on malformed bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (_, body) = unframe(CIPHERTEXT_MAGIC, bytes)
            .map_err(|e| CryptoError::Decryption(format!("Invalid ciphertext: {e}")))?;
        let wire: CiphertextWire = bincode::deserialize(body)
            .map_err(|e| CryptoError::Decryption(format!("Invalid ciphertext body: {e}")))?;

        let degree = wire.degree as usize;
        let ct = Self {
            key_id: wire.key_id,
            len: wire.len as usize,
            bound: wire.bound,
            c0: Poly { coeffs: wire.c0 },
            c1: Poly { coeffs: wire.c1 },
        };
        if ct.c0.degree() != degree || ct.c1.degree() != degree {
            return Err(CryptoError::Decryption(
                "ciphertext polynomials do not match declared degree".into(),
            ));
        }
        if ct.len == 0 || ct.len > degree / 2 {
            return Err(CryptoError::Decryption(format!(
                "ciphertext slot count {} is invalid for degree {degree}",
                ct.len
            )));
        }
        if !ct.bound.is_finite() || ct.bound < 0.0 {
            return Err(CryptoError::Decryption(
                "ciphertext magnitude bound is invalid".into(),
            ));
        }
        if !ct.c0.is_reduced() || !ct.c1.is_reduced() {
            return Err(CryptoError::Decryption(
                "ciphertext coefficients out of range".into(),
            ));
        }
        Ok(ct)
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ciphertext")
            .field("degree", &self.degree())
            .field("len", &self.len)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

/// Stored magnitude bound for freshly encoded `values`: the largest |v|
/// rounded up to a power of two, at least 1. Ciphertext bytes then reveal
/// only the order of magnitude of the plaintext.
pub fn magnitude_bound(values: &[f64]) -> f64 {
    let max = values.iter().fold(1.0f64, |m, v| m.max(v.abs()));
    max.log2().ceil().exp2()
}

/// c0 = b·u + e1 + m, c1 = a·u + e2.
pub fn encrypt<R: Rng + CryptoRng>(
    ring: &RingContext,
    pk: &PublicKey,
    key_id: [u8; 32],
    plain: &Poly,
    len: usize,
    bound: f64,
    rng: &mut R,
) -> Ciphertext {
    let n = ring.degree();
    let mut u_small = sample_ternary(rng, n);
    let u = Poly::from_signed(&u_small.iter().map(|&c| i64::from(c)).collect::<Vec<_>>());
    u_small.zeroize();

    let mut c0 = ring.mul(pk.b(), &u);
    c0.add_assign(&sample_error(rng, n));
    c0.add_assign(plain);
    let mut c1 = ring.mul(pk.a(), &u);
    c1.add_assign(&sample_error(rng, n));

    Ciphertext {
        key_id,
        len,
        bound,
        c0,
        c1,
    }
}

/// m = c0 + c1·s.
pub fn decrypt(ring: &RingContext, sk: &SecretKey, ct: &Ciphertext) -> Poly {
    let s = sk.to_poly();
    let mut m = ring.mul(&ct.c1, &s);
    m.add_assign(&ct.c0);
    m
}

/// Slot-wise sum.
pub fn add(a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    Ciphertext {
        key_id: a.key_id,
        len: a.len.max(b.len),
        bound: a.bound + b.bound,
        c0: a.c0.add(&b.c0),
        c1: a.c1.add(&b.c1),
    }
}

/// Slot-wise difference.
pub fn sub(a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    Ciphertext {
        key_id: a.key_id,
        len: a.len.max(b.len),
        bound: a.bound + b.bound,
        c0: a.c0.sub(&b.c0),
        c1: a.c1.sub(&b.c1),
    }
}

/// Apply σ_g and switch the key back to s.
///
/// c0' = σ(c0) + Σ D_d(σ(c1))·b_d, c1' = Σ D_d(σ(c1))·a_d
pub fn apply_galois(
    ring: &RingContext,
    ct: &Ciphertext,
    element: u64,
    key: &GaloisKey,
) -> Ciphertext {
    let n = ring.degree();
    let c0 = ct.c0.automorphism(element);
    let c1 = ct.c1.automorphism(element);

    let mut acc0 = vec![0u64; n];
    let mut acc1 = vec![0u64; n];
    for (d, (b_d, a_d)) in key.b().iter().zip(key.a()).enumerate() {
        let digit = ring.forward(&c1.digit(d, DECOMP_BITS, DECOMP_MASK));
        pointwise_mul_acc(&mut acc0, &digit, &ring.forward(b_d));
        pointwise_mul_acc(&mut acc1, &digit, &ring.forward(a_d));
    }

    let mut new_c0 = ring.inverse(acc0);
    new_c0.add_assign(&c0);
    Ciphertext {
        key_id: ct.key_id,
        len: ct.len,
        bound: ct.bound,
        c0: new_c0,
        c1: ring.inverse(acc1),
    }
}
