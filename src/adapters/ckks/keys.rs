//! Key generation: secret, public and Galois (rotation) keys.
//!
//! Secret key s is ternary. The public key is an RLWE sample
//! (b, a) = (-(a·s + e), a). A Galois key for element g switches a
//! ciphertext from σ_g(s) back to s, using a base-2^DECOMP_BITS gadget so
//! key-switching noise stays small.

use std::collections::BTreeMap;

use rand::{CryptoRng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::encoding::Encoder;
use super::params::{DECOMP_BITS, NUM_DIGITS};
use super::ring::{pow_mod, Poly, RingContext};
use super::sampling::{
    expand_seed, gaussian_tail_bound, sample_error, sample_ternary, sample_uniform,
};
use crate::domain::CryptoError;

/// Ternary secret key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    coeffs: Vec<i8>,
}

impl SecretKey {
    /// # Errors
    /// Returns `CryptoError::MalformedContext` if any coefficient is outside {-1, 0, 1}.
    pub fn from_coeffs(mut coeffs: Vec<i8>) -> Result<Self, CryptoError> {
        if coeffs.iter().any(|c| !(-1..=1).contains(c)) {
            coeffs.zeroize();
            return Err(CryptoError::MalformedContext(
                "secret key is not ternary".into(),
            ));
        }
        Ok(Self { coeffs })
    }

    pub fn coeffs(&self) -> &[i8] {
        &self.coeffs
    }

    pub fn to_poly(&self) -> Zeroizing<Poly> {
        let wide: Zeroizing<Vec<i64>> =
            Zeroizing::new(self.coeffs.iter().map(|&c| i64::from(c)).collect());
        Zeroizing::new(Poly::from_signed(&wide))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("degree", &self.coeffs.len())
            .field("coeffs", &"[REDACTED]")
            .finish()
    }
}

/// RLWE public key. `a` is re-expanded from `seed`.
#[derive(Clone)]
pub struct PublicKey {
    b: Poly,
    a: Poly,
    seed: [u8; 32],
}

impl PublicKey {
    pub fn from_parts(b: Poly, seed: [u8; 32]) -> Self {
        let a = sample_uniform(&mut ChaCha20Rng::from_seed(seed), b.degree());
        Self { b, a, seed }
    }

    pub fn b(&self) -> &Poly {
        &self.b
    }

    pub fn a(&self) -> &Poly {
        &self.a
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    /// SHA-256 identifier binding ciphertexts to this key.
    pub fn key_id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"facecrypt-key-id-v1");
        hasher.update((self.b.degree() as u64).to_le_bytes());
        hasher.update(self.seed);
        for c in &self.b.coeffs {
            hasher.update(c.to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// True if `secret` is the key this public key was generated from,
    /// i.e. a·s + b is a small error polynomial.
    pub fn matches(&self, ring: &RingContext, secret: &SecretKey) -> bool {
        let s = secret.to_poly();
        let mut residual = ring.mul(&self.a, &s);
        residual.add_assign(&self.b);
        let ok = residual.inf_norm() <= gaussian_tail_bound() as u64;
        residual.zeroize();
        ok
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("degree", &self.b.degree())
            .finish_non_exhaustive()
    }
}

/// Key-switching key for one Galois element: NUM_DIGITS RLWE samples.
#[derive(Clone)]
pub struct GaloisKey {
    seed: [u8; 32],
    b: Vec<Poly>,
    a: Vec<Poly>,
}

impl GaloisKey {
    pub fn from_parts(b: Vec<Poly>, seed: [u8; 32]) -> Self {
        let n = b.first().map_or(0, Poly::degree);
        let a = expand_seed(&seed, n, b.len());
        Self { seed, b, a }
    }

    pub fn b(&self) -> &[Poly] {
        &self.b
    }

    pub fn a(&self) -> &[Poly] {
        &self.a
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }
}

/// Galois keys indexed by Galois element.
#[derive(Clone, Default)]
pub struct GaloisKeys {
    keys: BTreeMap<u64, GaloisKey>,
}

impl GaloisKeys {
    pub fn get(&self, element: u64) -> Option<&GaloisKey> {
        self.keys.get(&element)
    }

    pub fn insert(&mut self, element: u64, key: GaloisKey) {
        self.keys.insert(element, key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &GaloisKey)> {
        self.keys.iter()
    }

    pub fn elements(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl std::fmt::Debug for GaloisKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaloisKeys")
            .field("count", &self.keys.len())
            .finish()
    }
}

/// Rotation steps with a Galois key: 1, 2, 4, ... up to slots / 2.
pub fn rotation_steps(slots: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(1usize), |s| Some(s << 1)).take_while(move |&s| s < slots)
}

/// Freshly generated key material.
pub struct KeySet {
    pub secret: SecretKey,
    pub public: PublicKey,
    pub galois: Option<GaloisKeys>,
}

/// Generate a complete key set.
pub fn keygen<R: Rng + CryptoRng>(
    ring: &RingContext,
    encoder: &Encoder,
    with_galois: bool,
    rng: &mut R,
) -> KeySet {
    let n = ring.degree();
    let secret = SecretKey {
        coeffs: sample_ternary(rng, n),
    };
    let s = secret.to_poly();

    let mut seed = [0u8; 32];
    rng.fill(&mut seed);
    let a = sample_uniform(&mut ChaCha20Rng::from_seed(seed), n);
    let e = sample_error(rng, n);
    let b = ring.mul(&a, &s).add(&e).neg();
    let public = PublicKey { b, a, seed };

    let galois = with_galois.then(|| {
        let mut keys = GaloisKeys::default();
        for step in rotation_steps(encoder.slots()) {
            let element = encoder.galois_element(step);
            keys.insert(element, gen_galois_key(ring, &s, element, rng));
        }
        keys
    });

    KeySet {
        secret,
        public,
        galois,
    }
}

/// Key switching σ_g(s) -> s: b_d = -(a_d·s + e_d) + σ_g(s)·2^(DECOMP_BITS·d).
fn gen_galois_key<R: Rng + CryptoRng>(
    ring: &RingContext,
    s: &Poly,
    element: u64,
    rng: &mut R,
) -> GaloisKey {
    let n = ring.degree();
    let s_rot = Zeroizing::new(s.automorphism(element));

    let mut seed = [0u8; 32];
    rng.fill(&mut seed);
    let a = expand_seed(&seed, n, NUM_DIGITS);

    let b = a
        .iter()
        .enumerate()
        .map(|(d, a_d)| {
            let e_d = sample_error(rng, n);
            let gadget = pow_mod(2, u64::from(DECOMP_BITS) * d as u64);
            ring.mul(a_d, s)
                .add(&e_d)
                .neg()
                .add(&s_rot.scalar_mul(gadget))
        })
        .collect();

    GaloisKey { seed, b, a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn fixture(galois: bool) -> (RingContext, Encoder, KeySet) {
        let ring = RingContext::new(4096).expect("ring");
        let encoder = Encoder::new(4096);
        let keys = keygen(&ring, &encoder, galois, &mut StdRng::seed_from_u64(5));
        (ring, encoder, keys)
    }

    #[test]
    fn public_key_matches_its_secret() {
        let (ring, _, keys) = fixture(false);
        assert!(keys.public.matches(&ring, &keys.secret));
        assert!(keys.galois.is_none());

        let other = keygen(
            &ring,
            &Encoder::new(4096),
            false,
            &mut StdRng::seed_from_u64(6),
        );
        assert!(!keys.public.matches(&ring, &other.secret));
    }

    #[test]
    fn public_key_reexpands_from_seed() {
        let (_, _, keys) = fixture(false);
        let rebuilt = PublicKey::from_parts(keys.public.b().clone(), *keys.public.seed());
        assert_eq!(rebuilt.a(), keys.public.a());
        assert_eq!(rebuilt.key_id(), keys.public.key_id());
    }

    #[test]
    fn galois_keys_cover_power_of_two_rotations() {
        let (_, encoder, keys) = fixture(true);
        let galois = keys.galois.expect("galois keys");
        assert_eq!(galois.len(), rotation_steps(encoder.slots()).count());
        assert_eq!(galois.len(), 11);
        for step in rotation_steps(encoder.slots()) {
            let key = galois.get(encoder.galois_element(step)).expect("key");
            assert_eq!(key.b().len(), NUM_DIGITS);
            let rebuilt = GaloisKey::from_parts(key.b().to_vec(), *key.seed());
            assert_eq!(rebuilt.a(), key.a());
        }
    }

    #[test]
    fn secret_key_must_be_ternary() {
        assert!(SecretKey::from_coeffs(vec![0, 1, -1]).is_ok());
        assert!(matches!(
            SecretKey::from_coeffs(vec![0, 2]),
            Err(CryptoError::MalformedContext(_))
        ));
    }

    #[test]
    fn secret_key_debug_is_redacted() {
        let sk = SecretKey::from_coeffs(vec![1, -1, 0, 1]).expect("sk");
        let dbg = format!("{sk:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("-1"));
    }
}
