//! Encryption contexts: parameters plus key material, and their serialized forms.
//!
//! # Forms
//!
//! - **Secret** (`tag 0x01`): public key, Galois keys and the secret key.
//! - **Public** (`tag 0x02`): public key and Galois keys only. Can encrypt
//!   and evaluate, cannot decrypt.
//!
//! Both forms are framed (magic `FCTX`, version, SHA-256 digest) and carry
//! the `SchemeConfig` they were created under. Deserialization rejects any
//! mismatch with the configured parameters.
//!
//! # Size
//!
//! Galois keys dominate: one key per power-of-two rotation, each holding
//! `NUM_DIGITS` polynomials of N coefficients. At the default N = 8192 that is
//! 12 × 6 × 8192 × 8 bytes ≈ 4.7 MB, present in both forms, so an enrolled
//! user costs about 9.6 MB of context material. The secret form is the public
//! form plus N + 8 bytes. Disable Galois keys when no rotations are needed.

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::ciphertext::{self, Ciphertext};
use super::encoding::Encoder;
use super::framing::{frame, unframe};
use super::keys::{keygen, rotation_steps, GaloisKey, GaloisKeys, PublicKey, SecretKey};
use super::params::NUM_DIGITS;
use super::ring::{Poly, RingContext};
use crate::domain::{compute_fingerprint, CryptoError, SchemeConfig};

const CONTEXT_MAGIC: &[u8; 4] = b"FCTX";
const TAG_SECRET: u8 = 0x01;
const TAG_PUBLIC: u8 = 0x02;

/// A live CKKS context.
#[derive(Clone)]
pub struct CkksContext {
    config: SchemeConfig,
    ring: RingContext,
    encoder: Encoder,
    public_key: PublicKey,
    secret_key: Option<SecretKey>,
    galois_keys: Option<GaloisKeys>,
    key_id: [u8; 32],
}

#[derive(Serialize)]
struct GaloisWireRef<'a> {
    element: u64,
    seed: &'a [u8; 32],
    b: Vec<&'a [u64]>,
}

#[derive(Serialize)]
struct ContextWireRef<'a> {
    config: &'a SchemeConfig,
    key_id: &'a [u8; 32],
    pk_seed: &'a [u8; 32],
    pk_b: &'a [u64],
    galois: Option<Vec<GaloisWireRef<'a>>>,
    secret: Option<&'a [i8]>,
}

#[derive(Deserialize)]
struct GaloisWire {
    element: u64,
    seed: [u8; 32],
    b: Vec<Vec<u64>>,
}

#[derive(Deserialize)]
struct ContextWire {
    config: SchemeConfig,
    key_id: [u8; 32],
    pk_seed: [u8; 32],
    pk_b: Vec<u64>,
    galois: Option<Vec<GaloisWire>>,
    secret: Option<Vec<i8>>,
}

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedContext(msg.into())
}

fn checked_poly(coeffs: Vec<u64>, n: usize, what: &str) -> Result<Poly, CryptoError> {
    let poly = Poly { coeffs };
    if poly.degree() != n {
        return Err(malformed(format!(
            "{what} has {} coefficients, expected {n}",
            poly.degree()
        )));
    }
    if !poly.is_reduced() {
        return Err(malformed(format!("{what} has out-of-range coefficients")));
    }
    Ok(poly)
}

impl CkksContext {
    /// Generate fresh key material under `config`.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` if `config` is out of range.
    pub fn generate<R: Rng + CryptoRng>(
        config: SchemeConfig,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        config.validate()?;
        let n = config.polynomial_modulus_degree;
        let ring = RingContext::new(n)?;
        let encoder = Encoder::new(n);
        let keys = keygen(&ring, &encoder, config.galois_keys_enabled, rng);
        let key_id = keys.public.key_id();
        Ok(Self {
            config,
            ring,
            encoder,
            public_key: keys.public,
            secret_key: Some(keys.secret),
            galois_keys: keys.galois,
            key_id,
        })
    }

    pub fn config(&self) -> &SchemeConfig {
        &self.config
    }

    /// True if this context holds the secret key.
    pub fn is_private(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn has_galois_keys(&self) -> bool {
        self.galois_keys.is_some()
    }

    pub fn key_id(&self) -> &[u8; 32] {
        &self.key_id
    }

    /// Short hex identifier safe for logs.
    pub fn fingerprint(&self) -> String {
        compute_fingerprint(&self.key_id)
    }

    pub fn slot_count(&self) -> usize {
        self.encoder.slots()
    }

    pub(super) fn ring(&self) -> &RingContext {
        &self.ring
    }

    pub(super) fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub(super) fn galois_keys(&self) -> Option<&GaloisKeys> {
        self.galois_keys.as_ref()
    }

    /// Encode and encrypt `values` under the public key.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` if `values` cannot be encoded.
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        values: &[f64],
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        let plain = Zeroizing::new(self.encoder.encode(values, self.config.global_scale)?);
        Ok(ciphertext::encrypt(
            &self.ring,
            &self.public_key,
            self.key_id,
            &plain,
            values.len(),
            ciphertext::magnitude_bound(values),
            rng,
        ))
    }

    /// Decrypt and decode.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if there is no secret key or the
    /// ciphertext was produced under another context.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<f64>, CryptoError> {
        let sk = self.secret_key.as_ref().ok_or_else(|| {
            CryptoError::Decryption("context has no secret key".into())
        })?;
        self.check_compatible(ct)?;
        let plain = Zeroizing::new(ciphertext::decrypt(&self.ring, sk, ct));
        Ok(self
            .encoder
            .decode(&plain, self.config.global_scale, ct.len))
    }

    /// Ensure `ct` belongs to this context.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` on degree or key mismatch.
    pub fn check_compatible(&self, ct: &Ciphertext) -> Result<(), CryptoError> {
        if ct.degree() != self.ring.degree() {
            return Err(CryptoError::Decryption(format!(
                "ciphertext degree {} does not match context degree {}",
                ct.degree(),
                self.ring.degree()
            )));
        }
        if ct.key_id != self.key_id {
            return Err(CryptoError::Decryption(
                "ciphertext was encrypted under a different context".into(),
            ));
        }
        Ok(())
    }

    /// Serialize, including the secret key when `include_secret` is set.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if the secret form is requested
    /// from a public context, or bincode fails.
    pub fn serialize(&self, include_secret: bool) -> Result<Vec<u8>, CryptoError> {
        let secret = if include_secret {
            let sk = self.secret_key.as_ref().ok_or_else(|| {
                CryptoError::Serialization("context has no secret key to serialize".into())
            })?;
            Some(sk.coeffs())
        } else {
            None
        };

        let galois = self.galois_keys.as_ref().map(|keys| {
            keys.iter()
                .map(|(&element, key)| GaloisWireRef {
                    element,
                    seed: key.seed(),
                    b: key.b().iter().map(|p| p.coeffs.as_slice()).collect(),
                })
                .collect()
        });

        let wire = ContextWireRef {
            config: &self.config,
            key_id: &self.key_id,
            pk_seed: self.public_key.seed(),
            pk_b: &self.public_key.b().coeffs,
            galois,
            secret,
        };
        let body = Zeroizing::new(bincode::serialize(&wire).map_err(|e| {
            CryptoError::Serialization(format!("Failed to serialize context: {e}"))
        })?);
        let tag = if include_secret { TAG_SECRET } else { TAG_PUBLIC };
        Ok(frame(CONTEXT_MAGIC, tag, &body))
    }

    /// Rebuild a context from bytes produced by [`CkksContext::serialize`].
    ///
    /// # Errors
    /// Returns `CryptoError::MalformedContext` for truncated or corrupt input,
    /// a form other than the expected one, parameters different from
    /// `config`, or inconsistent key material.
    pub fn deserialize(
        bytes: &[u8],
        config: &SchemeConfig,
        expect_secret: bool,
    ) -> Result<Self, CryptoError> {
        let (tag, body) = unframe(CONTEXT_MAGIC, bytes).map_err(|e| malformed(e.to_string()))?;
        let expected_tag = if expect_secret { TAG_SECRET } else { TAG_PUBLIC };
        if tag != expected_tag {
            return Err(malformed(format!(
                "expected {} context, found {}",
                form_name(expected_tag),
                form_name(tag)
            )));
        }

        let wire: ContextWire = bincode::deserialize(body)
            .map_err(|e| malformed(format!("invalid context body: {e}")))?;
        let ContextWire {
            config: stored_config,
            key_id,
            pk_seed,
            pk_b,
            galois,
            secret,
        } = wire;
        let secret = secret.map(Zeroizing::new);

        if stored_config != *config {
            return Err(malformed(format!(
                "context parameters {stored_config:?} differ from configured {config:?}"
            )));
        }
        config
            .validate()
            .map_err(|e| malformed(format!("invalid parameters: {e}")))?;
        let n = config.polynomial_modulus_degree;
        let ring = RingContext::new(n)?;
        let encoder = Encoder::new(n);

        let public_key = PublicKey::from_parts(checked_poly(pk_b, n, "public key")?, pk_seed);
        if public_key.key_id() != key_id {
            return Err(malformed("key id does not match public key"));
        }

        let galois_keys = match (config.galois_keys_enabled, galois) {
            (true, Some(entries)) => Some(Self::rebuild_galois(entries, &encoder, n)?),
            (false, None) => None,
            (true, None) => return Err(malformed("missing Galois keys")),
            (false, Some(_)) => return Err(malformed("unexpected Galois keys")),
        };

        let secret_key = match (expect_secret, secret) {
            (true, Some(mut coeffs)) => {
                if coeffs.len() != n {
                    return Err(malformed(format!(
                        "secret key has {} coefficients, expected {n}",
                        coeffs.len()
                    )));
                }
                let sk = SecretKey::from_coeffs(std::mem::take(&mut *coeffs))?;
                if !public_key.matches(&ring, &sk) {
                    return Err(malformed("secret key does not match public key"));
                }
                Some(sk)
            }
            (false, None) => None,
            (true, None) => return Err(malformed("secret context has no secret key")),
            (false, Some(_)) => return Err(malformed("public context carries a secret key")),
        };

        Ok(Self {
            config: *config,
            ring,
            encoder,
            public_key,
            secret_key,
            galois_keys,
            key_id,
        })
    }

    fn rebuild_galois(
        entries: Vec<GaloisWire>,
        encoder: &Encoder,
        n: usize,
    ) -> Result<GaloisKeys, CryptoError> {
        let mut keys = GaloisKeys::default();
        for entry in entries {
            if entry.b.len() != NUM_DIGITS {
                return Err(malformed(format!(
                    "Galois key has {} digits, expected {NUM_DIGITS}",
                    entry.b.len()
                )));
            }
            let b = entry
                .b
                .into_iter()
                .map(|coeffs| checked_poly(coeffs, n, "Galois key"))
                .collect::<Result<Vec<_>, _>>()?;
            keys.insert(entry.element, GaloisKey::from_parts(b, entry.seed));
        }

        let expected: Vec<u64> = rotation_steps(encoder.slots())
            .map(|s| encoder.galois_element(s))
            .collect();
        let mut present: Vec<u64> = keys.elements().collect();
        let mut wanted = expected;
        present.sort_unstable();
        wanted.sort_unstable();
        if present != wanted {
            return Err(malformed("Galois key set does not match ring degree"));
        }
        Ok(keys)
    }
}

fn form_name(tag: u8) -> &'static str {
    match tag {
        TAG_SECRET => "secret",
        TAG_PUBLIC => "public",
        _ => "unknown",
    }
}

impl std::fmt::Debug for CkksContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksContext")
            .field("config", &self.config)
            .field("fingerprint", &self.fingerprint())
            .field("private", &self.is_private())
            .field("galois_keys", &self.galois_keys.as_ref().map(GaloisKeys::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config(galois: bool) -> SchemeConfig {
        SchemeConfig::with_scale_bits(4096, 40, galois)
    }

    fn context(galois: bool, seed: u64) -> CkksContext {
        CkksContext::generate(small_config(galois), &mut StdRng::seed_from_u64(seed))
            .expect("context")
    }

    #[test]
    fn secret_form_roundtrip_decrypts() {
        let ctx = context(false, 1);
        let mut rng = StdRng::seed_from_u64(100);
        let ct = ctx.encrypt(&[0.5, -0.25, 0.125], &mut rng).expect("encrypt");

        let bytes = ctx.serialize(true).expect("serialize");
        let restored =
            CkksContext::deserialize(&bytes, &small_config(false), true).expect("deserialize");
        assert!(restored.is_private());
        assert_eq!(restored.key_id(), ctx.key_id());

        let values = restored.decrypt(&ct).expect("decrypt");
        assert!((values[0] - 0.5).abs() < 1e-6);
        assert!((values[2] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn secret_form_adds_only_the_secret_key() {
        let ctx = context(true, 40);
        let secret = ctx.serialize(true).expect("secret");
        let public = ctx.serialize(false).expect("public");

        let galois_bytes = rotation_steps(ctx.slot_count()).count() * NUM_DIGITS * 4096 * 8;
        assert!(public.len() > galois_bytes);
        assert_eq!(secret.len() - public.len(), 4096 + 8);
    }

    #[test]
    fn public_form_cannot_decrypt() {
        let ctx = context(false, 2);
        let bytes = ctx.serialize(false).expect("serialize");
        let public =
            CkksContext::deserialize(&bytes, &small_config(false), false).expect("deserialize");
        assert!(!public.is_private());

        let ct = public
            .encrypt(&[1.0], &mut StdRng::seed_from_u64(3))
            .expect("encrypt");
        assert!(matches!(public.decrypt(&ct), Err(CryptoError::Decryption(_))));
        assert!((ctx.decrypt(&ct).expect("decrypt")[0] - 1.0).abs() < 1e-6);
        assert!(matches!(
            public.serialize(true),
            Err(CryptoError::Serialization(_))
        ));
    }

    #[test]
    fn form_mismatch_is_malformed() {
        let ctx = context(false, 3);
        let secret = ctx.serialize(true).expect("serialize");
        let public = ctx.serialize(false).expect("serialize");
        assert!(matches!(
            CkksContext::deserialize(&secret, &small_config(false), false),
            Err(CryptoError::MalformedContext(_))
        ));
        assert!(matches!(
            CkksContext::deserialize(&public, &small_config(false), true),
            Err(CryptoError::MalformedContext(_))
        ));
    }

    #[test]
    fn parameter_mismatch_is_malformed() {
        let ctx = context(false, 4);
        let bytes = ctx.serialize(true).expect("serialize");
        let other_scale = SchemeConfig::with_scale_bits(4096, 30, false);
        let other_galois = small_config(true);
        for config in [other_scale, other_galois] {
            assert!(matches!(
                CkksContext::deserialize(&bytes, &config, true),
                Err(CryptoError::MalformedContext(_))
            ));
        }
    }

    #[test]
    fn corrupt_bytes_are_malformed() {
        let ctx = context(false, 5);
        let bytes = ctx.serialize(true).expect("serialize");
        for bad in [
            &bytes[..bytes.len() - 1],
            &bytes[..10],
            &b"not a context at all, just some bytes here"[..],
        ] {
            assert!(matches!(
                CkksContext::deserialize(bad, &small_config(false), true),
                Err(CryptoError::MalformedContext(_))
            ));
        }
    }

    #[test]
    fn contexts_are_isolated() {
        let a = context(false, 6);
        let b = context(false, 7);
        let ct = a
            .encrypt(&[0.1, 0.2], &mut StdRng::seed_from_u64(8))
            .expect("encrypt");
        assert!(matches!(b.decrypt(&ct), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn galois_keys_survive_serialization() {
        let ctx = context(true, 9);
        let bytes = ctx.serialize(false).expect("serialize");
        let public =
            CkksContext::deserialize(&bytes, &small_config(true), false).expect("deserialize");
        assert!(public.has_galois_keys());
        assert_eq!(
            public.galois_keys().map(GaloisKeys::len),
            ctx.galois_keys().map(GaloisKeys::len)
        );
    }

    #[test]
    fn debug_omits_key_material() {
        let ctx = context(false, 10);
        let dbg = format!("{ctx:?}");
        assert!(dbg.contains("fingerprint"));
        assert!(!dbg.contains("coeffs"));
    }
}
