//! Error types for ledgers, the registry and workflows.

use qualitrace_core::{Digest, EncodingError, FailureReason, IntegrityError, SubjectId};
use qualitrace_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::oracle::OracleError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The record could not be canonically encoded. Nothing was appended.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// An optimistic append lost a race: the tail moved since it was read.
    ///
    /// Recoverable. Re-read the tail and retry.
    #[error("stale tail for {subject}: expected {expected:?}, actual {actual:?}")]
    StaleTail {
        subject: SubjectId,
        expected: Option<Digest>,
        actual: Option<Digest>,
    },

    /// The subject's chain failed verification. Terminal for that subject.
    #[error("integrity failure in {subject}: {source}")]
    Integrity {
        subject: SubjectId,
        #[source]
        source: IntegrityError,
    },

    /// A record about one product was appended to another product's ledger.
    #[error("record for {found} cannot be appended to ledger {subject}")]
    SubjectMismatch { subject: SubjectId, found: String },

    /// No ledger exists for the subject.
    #[error("unknown subject: {0}")]
    UnknownSubject(SubjectId),

    /// The product already has a registration block.
    #[error("product already registered: {0}")]
    AlreadyRegistered(SubjectId),

    /// An inspection was attempted before the product was registered.
    #[error("product not registered: {0}")]
    UnregisteredProduct(SubjectId),

    /// The inspection oracle returned values outside `0..=100`.
    #[error("invalid oracle verdict: {0}")]
    InvalidVerdict(String),

    /// The inspection oracle failed.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Workflow configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Storage error. Corrupt stored blocks arrive as [`LedgerError::Integrity`].
    #[error("storage error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            // A stored block that no longer decodes cannot reproduce its hash.
            StoreError::Corrupt { subject, index, .. } => LedgerError::Integrity {
                subject,
                source: IntegrityError::new(index, FailureReason::HashMismatch),
            },
            other => LedgerError::Store(other),
        }
    }
}

impl LedgerError {
    /// Whether the error signals tampering or corruption.
    pub fn is_integrity(&self) -> bool {
        matches!(self, LedgerError::Integrity { .. })
    }

    /// Whether retrying the operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StaleTail { .. })
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_store_block_is_integrity() {
        let err = LedgerError::from(StoreError::Corrupt {
            subject: SubjectId::new("P1").unwrap(),
            seq: 4,
            index: 3,
            reason: "score 200 out of range".into(),
        });

        assert!(err.is_integrity());
        match err {
            LedgerError::Integrity { source, .. } => {
                assert_eq!(source, IntegrityError::new(3, FailureReason::HashMismatch));
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_store_errors_stay_storage() {
        let err = LedgerError::from(StoreError::Migration("v9".into()));
        assert!(matches!(err, LedgerError::Store(StoreError::Migration(_))));
        assert!(!err.is_integrity());
    }
}
