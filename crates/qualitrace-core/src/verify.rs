//! Chain verification.
//!
//! The verifier is pure: it takes an ordered slice of blocks and reports the
//! earliest position at which the chain stops being trustworthy. It works
//! over anything implementing [`ChainLink`], so the same rules apply to
//! sealed [`Block`]s in memory and to untrusted [`BlockRecord`]s read back
//! from storage.
//!
//! Checks per index, stopping at the first failure:
//! 1. The recomputed hash equals the stored hash (`HashMismatch`).
//! 2. For `i > 0`: `previous_hash` equals the predecessor's hash
//!    (`ChainBroken`), then `seq` is the predecessor's plus one
//!    (`SequenceGap`).
//! 3. For `i == 0`: `previous_hash` is the zero sentinel and `seq` is 0
//!    (`InvalidGenesis`).

use std::sync::Arc;

use serde::Serialize;

use crate::block::{Block, BlockRecord};
use crate::digest::Digest;
use crate::error::{EncodingError, FailureReason, IntegrityError};
use crate::record::Record;

/// Read access to the fields the verifier needs.
pub trait ChainLink {
    fn sequence_number(&self) -> u64;
    fn timestamp(&self) -> i64;
    fn record(&self) -> &Record;
    fn previous_hash(&self) -> &Digest;
    fn hash(&self) -> &Digest;

    /// Recompute the hash from the other four fields.
    fn recompute_hash(&self) -> Result<Digest, EncodingError> {
        Block::compute_hash(
            self.sequence_number(),
            self.timestamp(),
            self.record(),
            self.previous_hash(),
        )
    }
}

impl ChainLink for Block {
    fn sequence_number(&self) -> u64 {
        Block::sequence_number(self)
    }
    fn timestamp(&self) -> i64 {
        Block::timestamp(self)
    }
    fn record(&self) -> &Record {
        Block::record(self)
    }
    fn previous_hash(&self) -> &Digest {
        Block::previous_hash(self)
    }
    fn hash(&self) -> &Digest {
        Block::hash(self)
    }
}

impl ChainLink for BlockRecord {
    fn sequence_number(&self) -> u64 {
        self.seq
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn record(&self) -> &Record {
        &self.record
    }
    fn previous_hash(&self) -> &Digest {
        &self.previous_hash
    }
    fn hash(&self) -> &Digest {
        &self.hash
    }
}

impl<T: ChainLink + ?Sized> ChainLink for Arc<T> {
    fn sequence_number(&self) -> u64 {
        (**self).sequence_number()
    }
    fn timestamp(&self) -> i64 {
        (**self).timestamp()
    }
    fn record(&self) -> &Record {
        (**self).record()
    }
    fn previous_hash(&self) -> &Digest {
        (**self).previous_hash()
    }
    fn hash(&self) -> &Digest {
        (**self).hash()
    }
}

impl<T: ChainLink + ?Sized> ChainLink for &T {
    fn sequence_number(&self) -> u64 {
        (**self).sequence_number()
    }
    fn timestamp(&self) -> i64 {
        (**self).timestamp()
    }
    fn record(&self) -> &Record {
        (**self).record()
    }
    fn previous_hash(&self) -> &Digest {
        (**self).previous_hash()
    }
    fn hash(&self) -> &Digest {
        (**self).hash()
    }
}

/// Outcome of verifying a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub ok: bool,
    /// Earliest failing position; `None` when `ok`.
    pub first_failure_index: Option<usize>,
    pub reason: Option<FailureReason>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            ok: true,
            first_failure_index: None,
            reason: None,
        }
    }

    pub fn failed(index: usize, reason: FailureReason) -> Self {
        Self {
            ok: false,
            first_failure_index: Some(index),
            reason: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The failure as a typed error, if any.
    pub fn failure(&self) -> Option<IntegrityError> {
        match (self.first_failure_index, self.reason) {
            (Some(index), Some(reason)) => Some(IntegrityError::new(index, reason)),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(), IntegrityError> {
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl From<IntegrityError> for VerificationResult {
    fn from(err: IntegrityError) -> Self {
        Self::failed(err.index, err.reason)
    }
}

/// Verify a complete chain starting at genesis.
///
/// An empty chain is valid.
pub fn verify<L: ChainLink>(blocks: &[L]) -> VerificationResult {
    check(blocks, None)
}

/// Verify a window of a chain that does not start at genesis.
///
/// `anchor` is the hash of the block just before the window and `first_seq`
/// the sequence number expected at index 0. Indices in the result are
/// relative to the window.
pub fn verify_segment<L: ChainLink>(
    blocks: &[L],
    anchor: &Digest,
    first_seq: u64,
) -> VerificationResult {
    check(blocks, Some((anchor, first_seq)))
}

fn check<L: ChainLink>(blocks: &[L], anchor: Option<(&Digest, u64)>) -> VerificationResult {
    for (i, block) in blocks.iter().enumerate() {
        match block.recompute_hash() {
            Ok(hash) if &hash == block.hash() => {}
            // A stored record that no longer encodes was altered.
            _ => return VerificationResult::failed(i, FailureReason::HashMismatch),
        }

        let (expected_prev, expected_seq) = match (i, anchor) {
            (0, None) => {
                if !block.previous_hash().is_zero() || block.sequence_number() != 0 {
                    return VerificationResult::failed(0, FailureReason::InvalidGenesis);
                }
                continue;
            }
            (0, Some((prev, seq))) => (*prev, Some(seq)),
            _ => {
                let prev = &blocks[i - 1];
                (*prev.hash(), prev.sequence_number().checked_add(1))
            }
        };

        if block.previous_hash() != &expected_prev {
            return VerificationResult::failed(i, FailureReason::ChainBroken);
        }
        if Some(block.sequence_number()) != expected_seq {
            return VerificationResult::failed(i, FailureReason::SequenceGap);
        }
    }

    VerificationResult::valid()
}
