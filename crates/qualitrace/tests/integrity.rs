//! Tamper evidence properties over generated chains.

use proptest::prelude::*;

use qualitrace::{verify, Digest, FailureReason, LedgerRegistry, Record};
use qualitrace_testkit::fixtures::{product_id, sample_inspection, to_records, Tamper};
use qualitrace_testkit::generators::{self, chain_from_params, ChainParams};

proptest! {
    #[test]
    fn untouched_chains_verify(params: ChainParams) {
        let chain = to_records(&chain_from_params(&params));
        prop_assert!(verify(&chain).ok);
    }

    #[test]
    fn timestamp_edit_is_hash_mismatch(
        params: ChainParams,
        pick in any::<prop::sample::Index>(),
        delta in 1i64..1_000_000,
    ) {
        let mut chain = to_records(&chain_from_params(&params));
        let i = pick.index(chain.len());
        let ts = chain[i].timestamp + delta;
        Tamper::Timestamp(ts).apply(&mut chain[i]);

        let result = verify(&chain);
        prop_assert!(!result.ok);
        prop_assert_eq!(result.first_failure_index, Some(i));
        prop_assert_eq!(result.reason, Some(FailureReason::HashMismatch));
    }

    #[test]
    fn record_edit_is_hash_mismatch(
        params: ChainParams,
        pick in any::<prop::sample::Index>(),
        replacement in generators::event("P0".to_string()),
    ) {
        let mut chain = to_records(&chain_from_params(&params));
        let i = pick.index(chain.len());
        prop_assume!(chain[i].record != replacement);
        Tamper::Record(replacement).apply(&mut chain[i]);

        let result = verify(&chain);
        prop_assert_eq!(result.first_failure_index, Some(i));
        prop_assert_eq!(result.reason, Some(FailureReason::HashMismatch));
    }

    #[test]
    fn resealed_block_breaks_the_next_link(
        params: ChainParams,
        pick in any::<prop::sample::Index>(),
    ) {
        let blocks = chain_from_params(&params);
        prop_assume!(blocks.len() >= 2);
        let i = pick.index(blocks.len() - 1);

        // An attacker who rewrites block i and recomputes its hash still
        // breaks the link from block i + 1.
        let mut chain = to_records(&blocks);
        let forged = qualitrace::Block::seal(
            chain[i].seq,
            chain[i].timestamp + 1,
            chain[i].record.clone(),
            chain[i].previous_hash,
        ).unwrap();
        chain[i] = forged.to_record();

        let result = verify(&chain);
        prop_assert_eq!(result.first_failure_index, Some(i + 1));
        prop_assert_eq!(result.reason, Some(FailureReason::ChainBroken));
    }

    #[test]
    fn previous_hash_edit_is_detected(
        params: ChainParams,
        pick in any::<prop::sample::Index>(),
        forged in generators::digest(),
    ) {
        let mut chain = to_records(&chain_from_params(&params));
        let i = pick.index(chain.len());
        prop_assume!(chain[i].previous_hash != forged);
        Tamper::PreviousHash(forged).apply(&mut chain[i]);

        let result = verify(&chain);
        prop_assert!(!result.ok);
        prop_assert_eq!(result.first_failure_index, Some(i));
    }

    #[test]
    fn swapping_adjacent_blocks_is_detected(
        params: ChainParams,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut chain = to_records(&chain_from_params(&params));
        prop_assume!(chain.len() >= 2);
        let i = pick.index(chain.len() - 1);
        chain.swap(i, i + 1);

        let result = verify(&chain);
        prop_assert!(!result.ok);
        prop_assert_eq!(result.first_failure_index, Some(i));
        let expected = if i == 0 {
            FailureReason::InvalidGenesis
        } else {
            FailureReason::ChainBroken
        };
        prop_assert_eq!(result.reason, Some(expected));
    }

    #[test]
    fn truncated_prefix_is_detected(params: ChainParams) {
        let chain = to_records(&chain_from_params(&params));
        prop_assume!(chain.len() >= 2);

        let result = verify(&chain[1..]);
        prop_assert_eq!(result.first_failure_index, Some(0));
    }
}

#[test]
fn dropped_middle_block_is_chain_broken() {
    let registry = LedgerRegistry::new();
    let id = product_id("P1");
    for i in 0..4u8 {
        let record = sample_inspection("P1", &format!("I{}", i), 80 + i, 75);
        registry.append_record(&id, Record::from(record)).unwrap();
    }

    let mut chain = registry.get(&id).unwrap().export();
    chain.remove(2);

    let result = verify(&chain);
    assert_eq!(result.first_failure_index, Some(2));
    assert_eq!(result.reason, Some(FailureReason::ChainBroken));
}

#[test]
fn forged_genesis_link_is_invalid_genesis() {
    let registry = LedgerRegistry::new();
    let id = product_id("P1");
    let record = sample_inspection("P1", "I1", 92, 75);
    registry.append_record(&id, record.into()).unwrap();

    let mut chain = registry.get(&id).unwrap().export();
    let forged = qualitrace::Block::seal(
        0,
        chain[0].timestamp,
        chain[0].record.clone(),
        Digest([7; 32]),
    )
    .unwrap();
    chain[0] = forged.to_record();

    let result = verify(&chain);
    assert_eq!(result.first_failure_index, Some(0));
    assert_eq!(result.reason, Some(FailureReason::InvalidGenesis));
}

#[test]
fn subjects_are_independent() {
    let registry = LedgerRegistry::new();
    let p1 = product_id("P1");
    let p2 = product_id("P2");

    registry
        .append_record(&p1, sample_inspection("P1", "I1", 92, 75).into())
        .unwrap();
    registry
        .append_record(&p2, sample_inspection("P2", "I1", 92, 75).into())
        .unwrap();
    registry
        .append_record(&p1, sample_inspection("P1", "I2", 10, 75).into())
        .unwrap();

    let p2_ledger = registry.get(&p2).unwrap();
    assert_eq!(p2_ledger.len(), 1);
    assert!(p2_ledger.tail().unwrap().is_genesis());
    assert_eq!(registry.get(&p1).unwrap().len(), 2);
    assert!(registry.verify_subject(&p1).unwrap().ok);
    assert!(registry.verify_subject(&p2).unwrap().ok);
}
