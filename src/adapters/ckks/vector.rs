//! Encrypted vectors bound to a context, and the lazy (unbound) form.
//!
//! A [`LazyVector`] is a ciphertext parsed from bytes without a context.
//! [`LazyVector::link_context`] binds it to one, checking that the
//! ciphertext was produced under that context, without re-encoding.

use rand::{CryptoRng, Rng};

use super::ciphertext::{self, Ciphertext};
use super::context::CkksContext;
use super::params::WRAP_MAGNITUDE;
use crate::domain::{CryptoError, EncryptedVector};

/// A parsed ciphertext with no context attached.
#[derive(Debug, Clone)]
pub struct LazyVector {
    ct: Ciphertext,
}

impl LazyVector {
    /// # Errors
    /// Returns `CryptoError::Decryption` if the bytes are not a ciphertext.
    pub fn from_encrypted(vector: &EncryptedVector) -> Result<Self, CryptoError> {
        Ciphertext::from_bytes(vector.as_bytes()).map(|ct| Self { ct })
    }

    /// Number of encoded components.
    pub fn len(&self) -> usize {
        self.ct.len
    }

    pub fn is_empty(&self) -> bool {
        self.ct.len == 0
    }

    /// Bind to `ctx`.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the ciphertext belongs to another
    /// context or has an incompatible degree.
    pub fn link_context(self, ctx: &CkksContext) -> Result<CkksVector<'_>, CryptoError> {
        ctx.check_compatible(&self.ct)?;
        Ok(CkksVector { ctx, ct: self.ct })
    }
}

/// A ciphertext bound to its context.
#[derive(Debug, Clone)]
pub struct CkksVector<'a> {
    ctx: &'a CkksContext,
    ct: Ciphertext,
}

impl<'a> CkksVector<'a> {
    /// Encrypt `values` under `ctx`.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` if `values` cannot be encoded.
    pub fn encrypt<R: Rng + CryptoRng>(
        ctx: &'a CkksContext,
        values: &[f64],
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            ctx,
            ct: ctx.encrypt(values, rng)?,
        })
    }

    pub fn len(&self) -> usize {
        self.ct.len
    }

    pub fn is_empty(&self) -> bool {
        self.ct.len == 0
    }

    /// # Errors
    /// Returns `CryptoError::Decryption` if the context has no secret key.
    pub fn decrypt(&self) -> Result<Vec<f64>, CryptoError> {
        self.ctx.decrypt(&self.ct)
    }

    /// # Errors
    /// Returns `CryptoError::Serialization` if encoding fails.
    pub fn serialize(&self) -> Result<EncryptedVector, CryptoError> {
        self.ct.to_bytes().map(EncryptedVector::from_bytes)
    }

    /// Slot-wise sum.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if the operands use different
    /// contexts or the result could exceed the representable range.
    pub fn add(&self, other: &Self) -> Result<Self, CryptoError> {
        self.check_same_context(other)?;
        self.check_magnitude(self.ct.bound + other.ct.bound)?;
        Ok(self.with(ciphertext::add(&self.ct, &other.ct)))
    }

    /// Slot-wise difference.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if the operands use different
    /// contexts or the result could exceed the representable range.
    pub fn sub(&self, other: &Self) -> Result<Self, CryptoError> {
        self.check_same_context(other)?;
        self.check_magnitude(self.ct.bound + other.ct.bound)?;
        Ok(self.with(ciphertext::sub(&self.ct, &other.ct)))
    }

    /// Cyclically rotate all N/2 slots left by `steps` (negative rotates right).
    ///
    /// The rotation is composed from the power-of-two Galois keys.
    ///
    /// # Errors
    /// Returns `CryptoError::MissingGaloisKeys` if the context has none.
    pub fn rotate(&self, steps: isize) -> Result<Self, CryptoError> {
        let slots = self.ctx.slot_count();
        let left = steps.rem_euclid(slots as isize) as usize;
        let keys = self
            .ctx
            .galois_keys()
            .ok_or(CryptoError::MissingGaloisKeys(left))?;

        let encoder = self.ctx.encoder();
        let mut ct = self.ct.clone();
        let mut remaining = left;
        let mut step = 1usize;
        while remaining > 0 {
            if remaining & 1 == 1 {
                let element = encoder.galois_element(step);
                let key = keys
                    .get(element)
                    .ok_or(CryptoError::MissingGaloisKeys(step))?;
                ct = ciphertext::apply_galois(self.ctx.ring(), &ct, element, key);
            }
            remaining >>= 1;
            step <<= 1;
        }
        Ok(self.with(ct))
    }

    /// Sum of all slots, replicated into every slot. Decrypts to one value.
    ///
    /// Slots past `len` encode zero, so the total is bounded by `len` times
    /// the per-slot bound.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if the total could exceed the
    /// representable range, `CryptoError::MissingGaloisKeys` if the context
    /// has no Galois keys.
    pub fn sum(&self) -> Result<Self, CryptoError> {
        let bound = self.ct.bound * self.ct.len as f64;
        self.check_magnitude(bound)?;

        let mut acc = self.clone();
        let mut step = 1usize;
        while step < self.ctx.slot_count() {
            let rotated = acc.rotate(step as isize)?;
            acc.ct = ciphertext::add(&acc.ct, &rotated.ct);
            step <<= 1;
        }
        acc.ct.len = 1;
        acc.ct.bound = bound;
        Ok(acc)
    }

    fn with(&self, ct: Ciphertext) -> Self {
        Self { ctx: self.ctx, ct }
    }

    fn check_magnitude(&self, bound: f64) -> Result<(), CryptoError> {
        let scaled = bound * self.ctx.config().global_scale;
        if scaled >= WRAP_MAGNITUDE {
            return Err(CryptoError::Computation(format!(
                "result magnitude up to {bound} exceeds the range of scale {}",
                self.ctx.config().global_scale
            )));
        }
        Ok(())
    }

    fn check_same_context(&self, other: &Self) -> Result<(), CryptoError> {
        if self.ct.key_id != other.ct.key_id {
            return Err(CryptoError::Computation(
                "operands were encrypted under different contexts".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemeConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context(galois: bool, seed: u64) -> CkksContext {
        CkksContext::generate(
            SchemeConfig::with_scale_bits(4096, 40, galois),
            &mut StdRng::seed_from_u64(seed),
        )
        .expect("context")
    }

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < tol, "slot {i}: {a} vs {e}");
        }
    }

    #[test]
    fn lazy_vector_links_to_its_context() {
        let ctx = context(false, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let bytes = CkksVector::encrypt(&ctx, &[0.3, 0.6], &mut rng)
            .and_then(|v| v.serialize())
            .expect("encrypt");

        let lazy = LazyVector::from_encrypted(&bytes).expect("parse");
        assert_eq!(lazy.len(), 2);
        let linked = lazy.link_context(&ctx).expect("link");
        assert_close(&linked.decrypt().expect("decrypt"), &[0.3, 0.6], 1e-6);
    }

    #[test]
    fn link_rejects_foreign_context() {
        let ctx = context(false, 3);
        let other = context(false, 4);
        let bytes = CkksVector::encrypt(&ctx, &[1.0], &mut StdRng::seed_from_u64(5))
            .and_then(|v| v.serialize())
            .expect("encrypt");
        let lazy = LazyVector::from_encrypted(&bytes).expect("parse");
        assert!(matches!(
            lazy.link_context(&other),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn add_and_sub() {
        let ctx = context(false, 6);
        let mut rng = StdRng::seed_from_u64(7);
        let a = CkksVector::encrypt(&ctx, &[1.0, 2.0, 3.0], &mut rng).expect("a");
        let b = CkksVector::encrypt(&ctx, &[0.5, 0.25, -1.0], &mut rng).expect("b");

        assert_close(&a.add(&b).expect("add").decrypt().expect("dec"), &[1.5, 2.25, 2.0], 1e-6);
        assert_close(&a.sub(&b).expect("sub").decrypt().expect("dec"), &[0.5, 1.75, 4.0], 1e-6);
    }

    #[test]
    fn add_rejects_mixed_contexts() {
        let ctx_a = context(false, 8);
        let ctx_b = context(false, 9);
        let mut rng = StdRng::seed_from_u64(10);
        let a = CkksVector::encrypt(&ctx_a, &[1.0], &mut rng).expect("a");
        let b = CkksVector::encrypt(&ctx_b, &[1.0], &mut rng).expect("b");
        assert!(matches!(a.add(&b), Err(CryptoError::Computation(_))));
    }

    #[test]
    fn rotate_requires_galois_keys() {
        let ctx = context(false, 11);
        let v = CkksVector::encrypt(&ctx, &[1.0], &mut StdRng::seed_from_u64(12)).expect("v");
        assert!(matches!(v.rotate(1), Err(CryptoError::MissingGaloisKeys(1))));
    }

    #[test]
    fn rotate_left_and_right() {
        let ctx = context(true, 13);
        let mut rng = StdRng::seed_from_u64(14);
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let v = CkksVector::encrypt(&ctx, &values, &mut rng).expect("v");

        let left = v.rotate(3).expect("rotate").decrypt().expect("dec");
        assert_close(&left, &[4.0, 5.0, 0.0, 0.0, 0.0], 1e-3);

        let right = v.rotate(-2).expect("rotate").decrypt().expect("dec");
        assert_close(&right, &[0.0, 0.0, 1.0, 2.0, 3.0], 1e-3);
    }

    #[test]
    fn sum_reduces_all_slots() {
        let ctx = context(true, 15);
        let mut rng = StdRng::seed_from_u64(16);
        let values: Vec<f64> = (1..=128).map(|i| i as f64 / 128.0).collect();
        let expected: f64 = values.iter().sum();
        let total = CkksVector::encrypt(&ctx, &values, &mut rng)
            .and_then(|v| v.sum())
            .and_then(|s| s.decrypt())
            .expect("sum");
        assert_eq!(total.len(), 1);
        assert!((total[0] - expected).abs() < 1e-2, "{} vs {expected}", total[0]);
    }

    #[test]
    fn sum_refuses_to_wrap() {
        let ctx = context(true, 17);
        let mut rng = StdRng::seed_from_u64(18);
        let values = vec![1000.0; ctx.slot_count()];
        let v = CkksVector::encrypt(&ctx, &values, &mut rng).expect("v");
        assert!(matches!(v.sum(), Err(CryptoError::Computation(_))));
    }

    #[test]
    fn add_refuses_to_wrap() {
        let ctx = context(false, 19);
        let mut rng = StdRng::seed_from_u64(20);
        let big = CkksVector::encrypt(&ctx, &[100_000.0], &mut rng).expect("big");
        let doubled = big.add(&big).expect("within range");
        assert!((doubled.decrypt().expect("dec")[0] - 200_000.0).abs() < 1e-3);
        assert!(matches!(doubled.add(&doubled), Err(CryptoError::Computation(_))));
    }
}
