use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid salt length: expected {expected}, got {got}")]
    InvalidSaltLength { expected: usize, got: usize },
}

/// Failure reported by an external identifier or key service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Identifier generation failed: {0}")]
    Identifier(String),

    #[error("Timestamp generation failed: {0}")]
    Timestamp(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
}
