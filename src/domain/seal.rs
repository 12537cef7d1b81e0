//! Password-based sealing of secret context bytes at rest.
//!
//! - Argon2id key derivation from a deployment password
//! - AES-256-GCM authenticated encryption
//! - Random salt and nonce per sealed value
//!
//! Sealed layout: `b"FCSL" | version u8 | salt_len u32 LE | salt | nonce[12] | ciphertext`.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Algorithm, Argon2, Params, PasswordHasher, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

const SEAL_MAGIC: &[u8; 4] = b"FCSL";
const SEAL_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// Errors during sealing/unsealing.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Sealing failed: {0}")]
    Encryption(String),

    #[error("Unsealing failed: wrong password or tampered data")]
    Decryption,

    #[error("Invalid sealed format")]
    InvalidFormat,
}

/// A sealed value with everything needed to open it except the password.
#[derive(Debug, Clone)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    /// Argon2id salt (base64, as produced by `SaltString`)
    pub salt: String,
    pub nonce: [u8; NONCE_LEN],
}

impl SealedSecret {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let salt_bytes = self.salt.as_bytes();
        let mut out = Vec::with_capacity(
            SEAL_MAGIC.len() + 1 + 4 + salt_bytes.len() + NONCE_LEN + self.ciphertext.len(),
        );
        out.extend_from_slice(SEAL_MAGIC);
        out.push(SEAL_VERSION);
        out.extend_from_slice(&(salt_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(salt_bytes);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// # Errors
    /// Returns `SealError::InvalidFormat` if the layout is not recognized.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SealError> {
        let rest = bytes
            .strip_prefix(SEAL_MAGIC.as_slice())
            .ok_or(SealError::InvalidFormat)?;
        let (&version, rest) = rest.split_first().ok_or(SealError::InvalidFormat)?;
        if version != SEAL_VERSION || rest.len() < 4 {
            return Err(SealError::InvalidFormat);
        }

        let (len_bytes, rest) = rest.split_at(4);
        let mut len_arr = [0u8; 4];
        len_arr.copy_from_slice(len_bytes);
        let salt_len = u32::from_le_bytes(len_arr) as usize;
        if rest.len() < salt_len + NONCE_LEN {
            return Err(SealError::InvalidFormat);
        }

        let (salt_bytes, rest) = rest.split_at(salt_len);
        let salt = std::str::from_utf8(salt_bytes)
            .map_err(|_| SealError::InvalidFormat)?
            .to_string();
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            salt,
            nonce,
        })
    }

    /// Cheap check used by stores to tell sealed values from raw context bytes.
    #[must_use]
    pub fn is_sealed(bytes: &[u8]) -> bool {
        bytes.starts_with(SEAL_MAGIC)
    }
}

fn derive_key(password: &str, salt: &SaltString) -> Result<Zeroizing<[u8; 32]>, SealError> {
    let params = Params::new(47104, 1, 1, Some(32))
        .map_err(|e| SealError::Derivation(format!("Invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| SealError::Derivation(e.to_string()))?;
    let hash_bytes = hash
        .hash
        .ok_or_else(|| SealError::Derivation("Hash output missing".to_string()))?;

    let bytes = hash_bytes.as_bytes();
    if bytes.len() < 32 {
        return Err(SealError::Derivation("Hash too short".to_string()));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&bytes[..32]);
    Ok(key)
}

/// Seal `plaintext` under `password`.
///
/// # Errors
/// Returns error if derivation or encryption fails.
pub fn seal(plaintext: &[u8], password: &str) -> Result<SealedSecret, SealError> {
    let salt = SaltString::generate(&mut OsRng);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| SealError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| SealError::Encryption(e.to_string()))?;

    Ok(SealedSecret {
        ciphertext,
        salt: salt.to_string(),
        nonce: nonce_bytes,
    })
}

/// Open a sealed value.
///
/// # Errors
/// Returns `SealError::Decryption` if the password is wrong or data is tampered.
pub fn unseal(sealed: &SealedSecret, password: &str) -> Result<Zeroizing<Vec<u8>>, SealError> {
    let salt = SaltString::from_b64(&sealed.salt).map_err(|_| SealError::InvalidFormat)?;
    let key = derive_key(password, &salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| SealError::Derivation(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| SealError::Decryption)
}
