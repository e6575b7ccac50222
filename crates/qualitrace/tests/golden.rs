//! Golden chain for cross-implementation verification.
//!
//! Every implementation of the Qualitrace ledger format must produce
//! identical canonical record bytes and block hashes for the P1 chain:
//! registration at T0, inspection I1 (score 92) a minute later, and a
//! verification query a minute after that.

use std::sync::Arc;

use qualitrace::core::{canonical_block_bytes, BLOCK_DOMAIN};
use qualitrace::{
    verify, Block, Digest, FailureReason, LedgerRegistry, ManualClock, VerificationResult,
};
use qualitrace_testkit::fixtures::product_id;
use qualitrace_testkit::vectors::{
    all_vectors, reference_chain, reference_inspection, verify_all_vectors, T0,
};

#[test]
fn golden_vectors_match() {
    let results = verify_all_vectors();
    assert_eq!(results.len(), 3);

    for (name, matches, bytes, hash) in results {
        println!("{}: record={} hash={}", name, bytes, hash);
        assert!(matches, "golden vector {:?} does not match", name);
    }
}

#[test]
fn golden_chain_links() {
    let chain = reference_chain();

    assert!(chain[0].is_genesis());
    assert_eq!(chain[1].previous_hash(), chain[0].hash());
    assert_eq!(chain[2].previous_hash(), chain[1].hash());
    assert_eq!(
        chain[0].hash(),
        &Digest::from_hex("4a1140edbd4539fa5678c7dc7778dcfa70761add0f1136752569c229f8cc9dd9")
            .unwrap()
    );
}

#[test]
fn golden_block_preimage_is_domain_separated() {
    let chain = reference_chain();
    let block = &chain[1];

    let bytes = canonical_block_bytes(
        block.sequence_number(),
        block.timestamp(),
        block.record(),
        block.previous_hash(),
    )
    .unwrap();

    assert!(bytes.starts_with(BLOCK_DOMAIN));
    assert_eq!(&qualitrace::core::digest(&bytes), block.hash());
}

/// The registry, driven by a manual clock, seals exactly the golden chain.
#[test]
fn registry_reproduces_golden_chain() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = LedgerRegistry::with_clock(clock.clone());
    let id = product_id("P1");

    for vector in all_vectors() {
        clock.set(vector.timestamp);
        registry.append_record(&id, vector.record).unwrap();
    }

    let snapshot = registry.get(&id).unwrap().iterate();
    let hashes: Vec<Digest> = snapshot.iter().map(|b| *b.hash()).collect();
    let expected: Vec<Digest> = reference_chain().iter().map(|b| *b.hash()).collect();
    assert_eq!(hashes, expected);
}

/// Flipping I1's score from 92 to 40 in storage is caught at block 1.
#[test]
fn golden_chain_score_tamper() {
    let mut stored: Vec<_> = reference_chain().iter().map(Block::to_record).collect();
    stored[1].record = reference_inspection(40);

    let result = verify(&stored);
    assert_eq!(
        result,
        VerificationResult::failed(1, FailureReason::HashMismatch)
    );
}
