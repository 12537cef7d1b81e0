//! facecrypt: privacy-preserving face verification.
//!
//! Command-line entry point. Command results go to stdout, logs to stderr
//! or a file (see `FACECRYPT_LOG_MODE`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use facecrypt::adapters::sanitize::SanitizingMakeWriter;
use facecrypt::adapters::{CkksAdapter, PrecomputedEmbeddingExtractor, SqliteUserStore};
use facecrypt::application::{EnrollmentService, VerificationService};
use facecrypt::config::{load_seal_password, AppConfig, LogMode};
use facecrypt::{ErrorKind, FacecryptError};

#[derive(Parser)]
#[command(name = "facecrypt")]
#[command(about = "Face verification against encrypted enrollment templates")]
#[command(version)]
struct Cli {
    /// User database path
    #[arg(long, global = true, env = "FACECRYPT_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll a user from a face list produced by the extractor
    Enroll {
        username: String,
        email: String,
        /// JSON file: `{"faces": [[f64, ...], ...]}` or a bare list of faces
        faces: PathBuf,
    },
    /// Verify a capture against an enrolled user
    Verify {
        username: String,
        /// JSON face list, as for `enroll`
        faces: PathBuf,
    },
    /// Remove a user and their encryption context
    Unenroll { username: String },
    /// List enrolled usernames
    List,
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::Config => 2,
        ErrorKind::DuplicateUser | ErrorKind::UnknownUser => 3,
        ErrorKind::NoFaceDetected | ErrorKind::DimensionMismatch | ErrorKind::Extraction => 4,
        ErrorKind::Encoding | ErrorKind::Decryption | ErrorKind::MalformedContext => 5,
        ErrorKind::Storage | ErrorKind::Internal => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    if let Some(db) = cli.db {
        config.db_path = db;
    }

    // Initialize logging.
    let (writer, _guard) = match &config.log_mode {
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogMode::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: open() below reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(e) => {
                    eprintln!("error: cannot open log file {}: {e}", path.display());
                    return ExitCode::from(2);
                }
            }
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            let kind = e
                .downcast_ref::<FacecryptError>()
                .map_or(ErrorKind::Internal, FacecryptError::kind);
            ExitCode::from(exit_code(kind))
        }
    }
}

fn run(command: Command, config: &AppConfig) -> Result<ExitCode> {
    let mut store = SqliteUserStore::open(&config.db_path)
        .with_context(|| format!("opening user database {}", config.db_path.display()))?;
    if let Some(password) = load_seal_password().map_err(FacecryptError::from)? {
        store = store.with_seal_password(password);
    }
    if !store.is_sealing() {
        tracing::warn!("No seal password configured; secret contexts are stored unsealed");
    }

    let scheme = Arc::new(CkksAdapter::new(config.scheme).map_err(FacecryptError::from)?);
    let store = Arc::new(store);
    let extractor = Arc::new(PrecomputedEmbeddingExtractor::new());

    match command {
        Command::Enroll {
            username,
            email,
            faces,
        } => {
            let input = read_faces(&faces)?;
            let receipt = EnrollmentService::new(scheme, store, extractor)
                .with_embedding_dimension(config.embedding_dimension)
                .enroll(&username, &email, &input)?;
            println!(
                "enrolled {} (context {})",
                receipt.username, receipt.context_fingerprint
            );
        }
        Command::Verify { username, faces } => {
            let input = read_faces(&faces)?;
            let outcome = VerificationService::new(scheme, store, extractor)
                .with_embedding_dimension(config.embedding_dimension)
                .with_policy(config.match_policy)
                .verify(&username, &input)?;
            println!("{outcome}");
            if !outcome.matched {
                return Ok(ExitCode::from(10));
            }
        }
        Command::Unenroll { username } => {
            EnrollmentService::new(scheme, store, extractor).unenroll(&username)?;
            println!("unenrolled {username}");
        }
        Command::List => {
            for username in EnrollmentService::new(scheme, store, extractor).list_users()? {
                println!("{username}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read_faces(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(bytes)
}
