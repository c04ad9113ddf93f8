//! Error types for StakeChain

use std::fmt;
use thiserror::Error;

/// The specific integrity check that rejected a transaction or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    TransactionIdMismatch,
    MissingSignature,
    SignatureMismatch,
    BlockHashMismatch,
    BrokenLinkage,
    DuplicateTransaction,
    TimestampRegression,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            VerificationFailure::TransactionIdMismatch => "transaction id mismatch",
            VerificationFailure::MissingSignature => "missing signature",
            VerificationFailure::SignatureMismatch => "signature mismatch",
            VerificationFailure::BlockHashMismatch => "block hash mismatch",
            VerificationFailure::BrokenLinkage => "broken chain linkage",
            VerificationFailure::DuplicateTransaction => "duplicate transaction",
            VerificationFailure::TimestampRegression => "block timestamp precedes its predecessor",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    // Construction errors: the caller may retry with corrected input.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Secret key does not correspond to public key {0}")]
    KeyMismatch(String),
    #[error("Empty blocks are not allowed by the current consensus configuration")]
    EmptyBlock,
    #[error("Stake overflow for validator {0}")]
    StakeOverflow(String),
    #[error("Encoded blob of {size} bytes exceeds limit of {limit}")]
    BlobTooLarge { size: u64, limit: u64 },

    // Integrity violations: the offending value must be rejected.
    #[error("Verification failed: {kind}: {detail}")]
    VerificationFailed {
        kind: VerificationFailure,
        detail: String,
    },

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Impossible internal state; the enclosing operation must not continue.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl ChainError {
    pub fn verification(kind: VerificationFailure, detail: impl Into<String>) -> Self {
        ChainError::VerificationFailed {
            kind,
            detail: detail.into(),
        }
    }

    /// Returns the integrity check that failed, if this is a verification error.
    pub fn verification_kind(&self) -> Option<VerificationFailure> {
        match self {
            ChainError::VerificationFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Internal accounting bugs. Everything else is bad external input or a
    /// transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::InvariantViolation(_))
    }

    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::CorruptData(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
