//! Error types for Qualitrace core.

use serde::Serialize;
use std::fmt;

use thiserror::Error;

/// A record or block preimage could not be canonically encoded or decoded.
///
/// These are caller bugs (malformed input), never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("required field `{0}` is absent or empty")]
    MissingField(&'static str),

    #[error("field `{field}` value {value} is out of range 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    #[error("unsupported value in canonical encoding: {0}")]
    UnsupportedValue(String),

    #[error("malformed encoding: {0}")]
    Malformed(String),
}

/// Why a chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The block's content no longer matches its stored hash.
    HashMismatch,
    /// `previous_hash` does not equal the predecessor's hash.
    ChainBroken,
    /// The sequence number does not follow the predecessor's.
    SequenceGap,
    /// The first block does not start at sequence 0 from the zero sentinel.
    InvalidGenesis,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::HashMismatch => "hash_mismatch",
            FailureReason::ChainBroken => "chain_broken",
            FailureReason::SequenceGap => "sequence_gap",
            FailureReason::InvalidGenesis => "invalid_genesis",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tamper or corruption evidence at a specific chain position.
///
/// Never auto-repaired. Trust in the affected history must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integrity failure at index {index}: {reason}")]
pub struct IntegrityError {
    /// Position of the earliest failing block in the verified slice.
    pub index: usize,
    pub reason: FailureReason,
}

impl IntegrityError {
    pub fn new(index: usize, reason: FailureReason) -> Self {
        Self { index, reason }
    }
}
