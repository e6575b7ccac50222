//! Block: one sealed, hash-linked ledger entry.
//!
//! A block is immutable. Its fields are private and the only way to create
//! one is [`Block::seal`], which derives the hash from the other four
//! fields. Blocks read back from storage arrive as [`BlockRecord`]s and
//! must pass through [`Block::from_record`] (or the verifier) before they
//! are trusted.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_block_bytes;
use crate::digest::{digest, Digest};
use crate::error::{EncodingError, FailureReason, IntegrityError};
use crate::record::Record;

/// A sealed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    seq: u64,
    timestamp: i64,
    record: Record,
    previous_hash: Digest,
    hash: Digest,
}

impl Block {
    /// Seal a block: canonically encode the preimage and hash it.
    ///
    /// Fails only when the record cannot be encoded.
    pub fn seal(
        seq: u64,
        timestamp: i64,
        record: Record,
        previous_hash: Digest,
    ) -> Result<Self, EncodingError> {
        let hash = Self::compute_hash(seq, timestamp, &record, &previous_hash)?;
        Ok(Self {
            seq,
            timestamp,
            record,
            previous_hash,
            hash,
        })
    }

    /// Seal the first block of a chain.
    pub fn genesis(timestamp: i64, record: Record) -> Result<Self, EncodingError> {
        Self::seal(0, timestamp, record, Digest::ZERO)
    }

    /// Hash of a block preimage.
    pub fn compute_hash(
        seq: u64,
        timestamp: i64,
        record: &Record,
        previous_hash: &Digest,
    ) -> Result<Digest, EncodingError> {
        let bytes = canonical_block_bytes(seq, timestamp, record, previous_hash)?;
        Ok(digest(&bytes))
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// Epoch milliseconds at which the block was sealed.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn previous_hash(&self) -> &Digest {
        &self.previous_hash
    }

    pub fn hash(&self) -> &Digest {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.seq == 0 && self.previous_hash.is_zero()
    }

    /// Export to the untrusted storage form.
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            seq: self.seq,
            timestamp: self.timestamp,
            record: self.record.clone(),
            previous_hash: self.previous_hash,
            hash: self.hash,
        }
    }

    /// Re-seal a stored block and accept it only if the stored hash matches.
    ///
    /// The block is checked in isolation, so the reported index is always 0.
    /// Linkage is the verifier's job.
    pub fn from_record(stored: BlockRecord) -> Result<Self, IntegrityError> {
        let sealed = Self::seal(
            stored.seq,
            stored.timestamp,
            stored.record,
            stored.previous_hash,
        )
        .map_err(|_| IntegrityError::new(0, FailureReason::HashMismatch))?;

        if sealed.hash != stored.hash {
            return Err(IntegrityError::new(0, FailureReason::HashMismatch));
        }

        Ok(sealed)
    }
}

/// Persisted or transported form of a block.
///
/// Every field is public and nothing is checked on construction. Treat it as
/// untrusted until [`crate::verify`] or [`Block::from_record`] accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub seq: u64,
    pub timestamp: i64,
    pub record: Record,
    pub previous_hash: Digest,
    pub hash: Digest,
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        block.to_record()
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = IntegrityError;

    fn try_from(stored: BlockRecord) -> Result<Self, Self::Error> {
        Block::from_record(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Label, ProductRegistration, QualityInspection};

    fn registration() -> Record {
        ProductRegistration {
            product_id: "P1".into(),
            name: "Widget".into(),
            manufacturer: "Acme".into(),
            category: "Industrial".into(),
            batch_number: "B1".into(),
            manufacture_date: "2024-01-15".into(),
        }
        .into()
    }

    fn inspection(score: u8) -> Record {
        QualityInspection {
            inspection_id: "I1".into(),
            product_id: "P1".into(),
            inspector: "inspector-1".into(),
            score,
            passed: score >= 75,
            labels: vec![Label::new("ok", score)],
        }
        .into()
    }

    #[test]
    fn test_seal_is_deterministic() {
        let a = Block::seal(0, 1000, registration(), Digest::ZERO).unwrap();
        let b = Block::seal(0, 1000, registration(), Digest::ZERO).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn test_genesis() {
        let block = Block::genesis(1000, registration()).unwrap();
        assert!(block.is_genesis());
        assert_eq!(block.sequence_number(), 0);
        assert!(block.previous_hash().is_zero());
        assert!(!block.hash().is_zero());
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let base = Block::seal(1, 1000, inspection(92), Digest::ZERO).unwrap();

        let variants = [
            Block::seal(2, 1000, inspection(92), Digest::ZERO).unwrap(),
            Block::seal(1, 1001, inspection(92), Digest::ZERO).unwrap(),
            Block::seal(1, 1000, inspection(40), Digest::ZERO).unwrap(),
            Block::seal(1, 1000, inspection(92), *base.hash()).unwrap(),
        ];

        for v in &variants {
            assert_ne!(v.hash(), base.hash());
        }
    }

    #[test]
    fn test_seal_rejects_invalid_record() {
        let result = Block::seal(1, 1000, inspection(101), Digest::ZERO);
        assert!(matches!(result, Err(EncodingError::OutOfRange { .. })));
    }

    #[test]
    fn test_record_roundtrip() {
        let block = Block::genesis(1000, registration()).unwrap();
        let stored = block.to_record();
        assert_eq!(Block::from_record(stored).unwrap(), block);
    }

    #[test]
    fn test_from_record_rejects_tampered_content() {
        let block = Block::seal(1, 1000, inspection(92), Digest::ZERO).unwrap();
        let mut stored = block.to_record();
        if let Record::QualityInspection(r) = &mut stored.record {
            r.score = 40;
        }

        let err = Block::from_record(stored).unwrap_err();
        assert_eq!(err.reason, FailureReason::HashMismatch);
    }

    #[test]
    fn test_from_record_rejects_unencodable_content() {
        let block = Block::seal(1, 1000, inspection(92), Digest::ZERO).unwrap();
        let mut stored = block.to_record();
        if let Record::QualityInspection(r) = &mut stored.record {
            r.score = 200;
        }

        assert!(Block::try_from(stored).is_err());
    }

    #[test]
    fn test_block_record_json() {
        let block = Block::genesis(1000, registration()).unwrap();
        let json = serde_json::to_string(&block.to_record()).unwrap();
        assert!(json.contains(&block.hash().to_hex()));

        let back: BlockRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(Block::from_record(back).unwrap(), block);
    }
}
