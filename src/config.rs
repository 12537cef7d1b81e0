//! Application configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `FACECRYPT_DB_PATH` | `facecrypt.db` |
//! | `FACECRYPT_POLY_MODULUS_DEGREE` | `8192` |
//! | `FACECRYPT_SCALE_BITS` | `40` |
//! | `FACECRYPT_GALOIS_KEYS` | `true` |
//! | `FACECRYPT_EMBEDDING_DIM` | `128` |
//! | `FACECRYPT_MATCH_THRESHOLD` | `0.6` |
//! | `FACECRYPT_LOG_MODE` | `stderr` |
//! | `FACECRYPT_LOG_FILE` | `facecrypt.log` |
//!
//! The seal password is read separately by [`load_seal_password`].

use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::{fs, io::Read, os::unix::io::FromRawFd};

use zeroize::Zeroizing;

use crate::domain::{
    MatchPolicy, SchemeConfig, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_SCALE_BITS,
};

const DB_PATH_ENV: &str = "FACECRYPT_DB_PATH";
const POLY_MODULUS_DEGREE_ENV: &str = "FACECRYPT_POLY_MODULUS_DEGREE";
const SCALE_BITS_ENV: &str = "FACECRYPT_SCALE_BITS";
const GALOIS_KEYS_ENV: &str = "FACECRYPT_GALOIS_KEYS";
const EMBEDDING_DIM_ENV: &str = "FACECRYPT_EMBEDDING_DIM";
const MATCH_THRESHOLD_ENV: &str = "FACECRYPT_MATCH_THRESHOLD";
const LOG_MODE_ENV: &str = "FACECRYPT_LOG_MODE";
const LOG_FILE_ENV: &str = "FACECRYPT_LOG_FILE";

/// Secure sources for the seal password.
///
/// Precedence (highest first):
/// - `FACECRYPT_SEAL_PASSWORD_FD` (read from an already-open FD, then close it)
/// - `FACECRYPT_SEAL_PASSWORD_FILE` (read from a file path)
/// - `/run/secrets/facecrypt_seal_password` (Docker/Compose secret default)
///
/// In release builds, reading secrets from environment variables is refused.
const SEAL_PASSWORD_FD_ENV: &str = "FACECRYPT_SEAL_PASSWORD_FD";
const SEAL_PASSWORD_FILE_ENV: &str = "FACECRYPT_SEAL_PASSWORD_FILE";
const SEAL_PASSWORD_DOCKER_SECRET_PATH: &str = "/run/secrets/facecrypt_seal_password";

// Dev-only escape hatch for local runs and tests.
const SEAL_PASSWORD_ENV_DEV: &str = "FACECRYPT_SEAL_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Seal password source unusable: {0}")]
    PasswordSource(String),
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMode {
    Stderr,
    File(PathBuf),
}

/// Fully validated application settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub scheme: SchemeConfig,
    pub embedding_dimension: usize,
    pub match_policy: MatchPolicy,
    pub log_mode: LogMode,
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            value: other.to_string(),
            reason: "expected true/false".into(),
        }),
    }
}

fn parse_num<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("facecrypt.db"));

        let degree = match lookup(POLY_MODULUS_DEGREE_ENV) {
            Some(v) => parse_num::<usize>(POLY_MODULUS_DEGREE_ENV, &v)?,
            None => SchemeConfig::default().polynomial_modulus_degree,
        };
        let scale_bits = match lookup(SCALE_BITS_ENV) {
            Some(v) => parse_num::<u32>(SCALE_BITS_ENV, &v)?,
            None => DEFAULT_SCALE_BITS,
        };
        let galois = match lookup(GALOIS_KEYS_ENV) {
            Some(v) => parse_bool(GALOIS_KEYS_ENV, &v)?,
            None => true,
        };
        let scheme = SchemeConfig::with_scale_bits(degree, scale_bits, galois);
        scheme.validate().map_err(|e| ConfigError::Invalid {
            var: POLY_MODULUS_DEGREE_ENV,
            value: format!("{degree} (scale 2^{scale_bits})"),
            reason: e.to_string(),
        })?;

        let embedding_dimension = match lookup(EMBEDDING_DIM_ENV) {
            Some(v) => parse_num::<usize>(EMBEDDING_DIM_ENV, &v)?,
            None => DEFAULT_EMBEDDING_DIMENSION,
        };
        if embedding_dimension == 0 || embedding_dimension > scheme.slot_count() {
            return Err(ConfigError::Invalid {
                var: EMBEDDING_DIM_ENV,
                value: embedding_dimension.to_string(),
                reason: format!("must be between 1 and {}", scheme.slot_count()),
            });
        }

        let threshold = match lookup(MATCH_THRESHOLD_ENV) {
            Some(v) => parse_num::<f64>(MATCH_THRESHOLD_ENV, &v)?,
            None => DEFAULT_MATCH_THRESHOLD,
        };
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                var: MATCH_THRESHOLD_ENV,
                value: threshold.to_string(),
                reason: "must be a positive number".into(),
            });
        }

        let log_mode = match lookup(LOG_MODE_ENV).as_deref().map(str::trim) {
            None | Some("stderr") => LogMode::Stderr,
            Some("file") => LogMode::File(
                lookup(LOG_FILE_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("facecrypt.log")),
            ),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_MODE_ENV,
                    value: other.to_string(),
                    reason: "expected stderr or file".into(),
                })
            }
        };

        Ok(Self {
            db_path,
            scheme,
            embedding_dimension,
            match_policy: MatchPolicy::with_threshold(threshold),
            log_mode,
        })
    }
}

fn non_empty_secret(raw: &str) -> Option<Zeroizing<String>> {
    let secret = raw.trim_end_matches(['\n', '\r']);
    (!secret.is_empty()).then(|| Zeroizing::new(secret.to_string()))
}

/// Read the seal password from the first configured source.
///
/// Returns `Ok(None)` when no source is configured: secret contexts are then
/// stored unsealed.
///
/// # Errors
/// Returns `ConfigError::PasswordSource` if a configured source cannot be
/// read or is empty.
pub fn load_seal_password() -> Result<Option<Zeroizing<String>>, ConfigError> {
    // 1) Already-open FD
    #[cfg(unix)]
    if let Ok(fd_str) = std::env::var(SEAL_PASSWORD_FD_ENV) {
        let fd: i32 = fd_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::PasswordSource(format!("{SEAL_PASSWORD_FD_ENV} is not a descriptor")))?;
        if fd <= 2 {
            return Err(ConfigError::PasswordSource(
                "refusing to read the seal password from stdio".into(),
            ));
        }

        // SAFETY: We take ownership of the FD for one-time secret read and close it.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        file.read_to_string(&mut buf)
            .map_err(|e| ConfigError::PasswordSource(e.to_string()))?;
        return non_empty_secret(&buf)
            .map(Some)
            .ok_or_else(|| ConfigError::PasswordSource("empty seal password".into()));
    }

    // 2) Explicit file path
    #[cfg(unix)]
    if let Ok(path) = std::env::var(SEAL_PASSWORD_FILE_ENV) {
        return read_secret_file(Path::new(path.trim())).map(Some);
    }

    // 3) Docker secrets default path
    #[cfg(unix)]
    if Path::new(SEAL_PASSWORD_DOCKER_SECRET_PATH).exists() {
        return read_secret_file(Path::new(SEAL_PASSWORD_DOCKER_SECRET_PATH)).map(Some);
    }

    // 4) Dev-only env var (refused in release builds)
    if cfg!(debug_assertions) {
        if let Ok(v) = std::env::var(SEAL_PASSWORD_ENV_DEV) {
            return non_empty_secret(&v)
                .map(Some)
                .ok_or_else(|| ConfigError::PasswordSource("empty seal password".into()));
        }
    }

    Ok(None)
}

#[cfg(unix)]
fn read_secret_file(path: &Path) -> Result<Zeroizing<String>, ConfigError> {
    let content = Zeroizing::new(
        fs::read_to_string(path)
            .map_err(|e| ConfigError::PasswordSource(format!("{}: {e}", path.display())))?,
    );
    non_empty_secret(&content).ok_or_else(|| ConfigError::PasswordSource("empty seal password".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(config.db_path, PathBuf::from("facecrypt.db"));
        assert_eq!(config.scheme, SchemeConfig::default());
        assert_eq!(config.embedding_dimension, 128);
        assert_eq!(config.match_policy.threshold, 0.6);
        assert_eq!(config.log_mode, LogMode::Stderr);
    }

    #[test]
    fn overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("FACECRYPT_DB_PATH", "/tmp/users.db"),
            ("FACECRYPT_POLY_MODULUS_DEGREE", "16384"),
            ("FACECRYPT_SCALE_BITS", "30"),
            ("FACECRYPT_GALOIS_KEYS", "no"),
            ("FACECRYPT_EMBEDDING_DIM", "512"),
            ("FACECRYPT_MATCH_THRESHOLD", "0.45"),
            ("FACECRYPT_LOG_MODE", "file"),
            ("FACECRYPT_LOG_FILE", "/var/log/fc.log"),
        ]))
        .expect("overrides");
        assert_eq!(config.scheme.polynomial_modulus_degree, 16384);
        assert_eq!(config.scheme.global_scale, 2f64.powi(30));
        assert!(!config.scheme.galois_keys_enabled);
        assert_eq!(config.embedding_dimension, 512);
        assert_eq!(config.match_policy.threshold, 0.45);
        assert_eq!(config.log_mode, LogMode::File(PathBuf::from("/var/log/fc.log")));
    }

    #[test]
    fn rejects_bad_values() {
        for pairs in [
            [("FACECRYPT_POLY_MODULUS_DEGREE", "1000")],
            [("FACECRYPT_POLY_MODULUS_DEGREE", "abc")],
            [("FACECRYPT_SCALE_BITS", "60")],
            [("FACECRYPT_GALOIS_KEYS", "maybe")],
            [("FACECRYPT_EMBEDDING_DIM", "0")],
            [("FACECRYPT_EMBEDDING_DIM", "5000")],
            [("FACECRYPT_MATCH_THRESHOLD", "-1")],
            [("FACECRYPT_LOG_MODE", "syslog")],
        ] {
            assert!(
                matches!(
                    AppConfig::from_lookup(lookup_from(&pairs)),
                    Err(ConfigError::Invalid { .. })
                ),
                "{pairs:?}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn secret_file_is_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("seal");
        std::fs::write(&path, "s3cret\n").expect("write");
        assert_eq!(read_secret_file(&path).expect("read").as_str(), "s3cret");

        std::fs::write(&path, "\n").expect("write");
        assert!(matches!(
            read_secret_file(&path),
            Err(ConfigError::PasswordSource(_))
        ));
    }
}
