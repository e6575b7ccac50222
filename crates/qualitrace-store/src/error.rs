//! Error types for the store module.

use qualitrace_core::{Digest, EncodingError, SubjectId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record could not be canonically encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A different block already occupies this chain position.
    #[error("conflict at subject {subject} seq {seq}: existing block {existing}")]
    Conflict {
        subject: SubjectId,
        seq: u64,
        existing: Digest,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A stored block no longer decodes into a block record.
    ///
    /// `index` is the block's position in the loaded chain. Raised only for
    /// block rows, so it always signals tampering or on-disk corruption.
    #[error("corrupt block at subject {subject} seq {seq} (index {index}): {reason}")]
    Corrupt {
        subject: SubjectId,
        seq: u64,
        index: usize,
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking database task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
