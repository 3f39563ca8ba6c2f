use murmur_shared::{CryptoError, ServiceError};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller-supplied field failed validation; nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A create-only write hit an existing key.
    #[error("{namespace}/{id} already exists")]
    AlreadyExists { namespace: String, id: String },

    /// Every identifier drawn collided with an existing key.
    #[error("Identifier space exhausted after {attempts} attempts")]
    IdExhausted { attempts: usize },

    /// The external identifier or key service reported failure.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Filesystem failure, with the path or key involved.
    #[error("IO error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// No record under this key.
    #[error("{namespace}/{id} not found")]
    NotFound { namespace: String, id: String },

    /// `Vault::init` has not completed yet.
    #[error("Store is not initialized")]
    NotInitialized,

    /// Encryption or decryption of a record failed.
    #[error("Crypto error on {id}: {source}")]
    Crypto {
        id: String,
        #[source]
        source: CryptoError,
    },

    /// A record could not be encoded or decoded.
    #[error("Codec error on {id}: {message}")]
    Codec { id: String, message: String },

    /// Stored data violates an invariant.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The persisted salt file has the wrong size.
    #[error("Salt file has {0} bytes")]
    InvalidSalt(usize),

    /// Invalid configuration (e.g. a grammar that does not compile).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// A repository mutex was poisoned by a panicking holder.
    #[error("Repository lock poisoned")]
    LockPoisoned,
}

impl From<ServiceError> for StoreError {
    fn from(e: ServiceError) -> Self {
        StoreError::GenerationFailed(e.to_string())
    }
}

impl StoreError {
    pub(crate) fn io(context: impl std::fmt::Display, source: std::io::Error) -> Self {
        StoreError::Io {
            context: context.to_string(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
