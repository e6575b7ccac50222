//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical record encoding and the block hash, so
//! any change to field naming, key ordering, integer encoding or the domain
//! prefix shows up as a failing vector. Another implementation of the same
//! ledger format must reproduce every value here.

use qualitrace_core::{
    canonical_record_bytes, Block, Digest, Label, ProductRegistration, QualityInspection, Record,
    VerificationQuery,
};

/// Timestamp of the first vector block (2024-01-15T00:00:00Z).
pub const T0: i64 = 1_705_276_800_000;

/// A golden test vector: one block of the reference chain.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Sequence number.
    pub seq: u64,
    /// Timestamp.
    pub timestamp: i64,
    /// Record sealed into the block.
    pub record: Record,
    /// Expected canonical record bytes (hex). Empty means report only.
    pub expected_record_bytes: &'static str,
    /// Expected block hash (hex). Empty means report only.
    pub expected_hash: &'static str,
}

/// Registration of product P1, the reference chain's genesis record.
pub fn reference_registration() -> Record {
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

/// Inspection I1 of product P1 with the given score.
pub fn reference_inspection(score: u8) -> Record {
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

/// Get all golden test vectors, in chain order.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "P1 registration (genesis)",
            seq: 0,
            timestamp: T0,
            record: reference_registration(),
            expected_record_bytes: "a7646b696e647470726f647563745f726567697374726174696f6e646e61\
                                    6d65665769646765746863617465676f72796a496e647573747269616c6a\
                                    70726f647563745f69646250316c62617463685f6e756d6265726242316c\
                                    6d616e7566616374757265726441636d65706d616e75666163747572655f\
                                    646174656a323032342d30312d3135",
            expected_hash: "4a1140edbd4539fa5678c7dc7778dcfa70761add0f1136752569c229f8cc9dd9",
        },
        GoldenVector {
            name: "P1 inspection I1 score 92",
            seq: 1,
            timestamp: T0 + 60_000,
            record: reference_inspection(92),
            expected_record_bytes: "a7646b696e64727175616c6974795f696e7370656374696f6e6573636f72\
                                    65185c666c6162656c7381a2656c6162656c626f6b6a636f6e666964656e\
                                    6365185c66706173736564f569696e73706563746f726b696e7370656374\
                                    6f722d316a70726f647563745f69646250316d696e7370656374696f6e5f\
                                    6964624931",
            expected_hash: "d73b44f652abf17bf651eddc35ff191a29d8cbed295b758497869040d8e1f258",
        },
        GoldenVector {
            name: "P1 verification query",
            seq: 2,
            timestamp: T0 + 120_000,
            record: VerificationQuery {
                product_id: "P1".into(),
                queried_at: T0 + 120_000,
                result_summary: "authentic".into(),
            }
            .into(),
            expected_record_bytes: "a4646b696e6472766572696669636174696f6e5f71756572796a70726f64\
                                    7563745f69646250316a717565726965645f61741b0000018d0a6cd0c06e\
                                    726573756c745f73756d6d6172796961757468656e746963",
            expected_hash: "70e2632fc3ea7c6ebc31375e34f90571d287167d2c1af08676f0853df6f93bcc",
        },
    ]
}

/// Seal the vectors into the reference chain, each linked to the last.
pub fn reference_chain() -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for vector in all_vectors() {
        let prev = blocks.last().map_or(Digest::ZERO, |b| *b.hash());
        match Block::seal(vector.seq, vector.timestamp, vector.record, prev) {
            Ok(block) => blocks.push(block),
            Err(e) => panic!("golden vector {:?} failed to encode: {}", vector.name, e),
        }
    }
    blocks
}

/// Check every vector against the current implementation.
///
/// Returns `(name, matches, record_bytes_hex, hash_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String, String)> {
    let chain = reference_chain();

    all_vectors()
        .iter()
        .zip(chain.iter())
        .map(|(v, block)| {
            let bytes = canonical_record_bytes(&v.record)
                .map(hex::encode)
                .unwrap_or_default();
            let hash = block.hash().to_hex();

            let expected_bytes = compact(v.expected_record_bytes);
            let bytes_match = expected_bytes.is_empty() || bytes == expected_bytes;
            let hash_match = v.expected_hash.is_empty() || hash == v.expected_hash;

            (v.name.to_string(), bytes_match && hash_match, bytes, hash)
        })
        .collect()
}

fn compact(hex: &str) -> String {
    hex.chars().filter(|c| !c.is_whitespace()).collect()
}
