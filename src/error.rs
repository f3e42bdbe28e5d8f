//! Error types for dossier.

use crate::crypto::CryptoError;
use crate::models::ResourceKind;
use thiserror::Error;

/// Main error type for tracker operations.
#[derive(Error, Debug)]
pub enum DossierError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{kind} record not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Remote request failed: {0}")]
    Remote(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decryption failed - incorrect passphrase or corrupted secret")]
    DecryptionFailed,

    #[error("A passphrase request is already pending")]
    PromptBusy,

    #[error("No passphrase request is pending")]
    NoPendingRequest,

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for DossierError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EmptyInput(what) => {
                Self::InvalidInput(format!("{what} must not be empty"))
            }
            CryptoError::DecryptionFailed | CryptoError::MalformedCiphertext => {
                Self::DecryptionFailed
            }
            other => Self::Crypto(other),
        }
    }
}

impl DossierError {
    /// Whether this failure came from the persistence boundary rather than
    /// from local validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::NotFound { .. } | Self::Remote(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DossierError>;
