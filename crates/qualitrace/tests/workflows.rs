//! End-to-end workflows: registration, inspection and verification.

use std::sync::Arc;
use std::thread;

use qualitrace::{
    Label, LedgerError, OracleError, OracleVerdict, QualitraceConfig, Record, RecordKind,
};
use qualitrace_testkit::fixtures::{
    product_id, sample_details, sample_inspection, ScriptedOracle, TestFixture,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn register_inspect_verify() {
    init_tracing();
    let fixture = TestFixture::new();

    let registration = fixture
        .registration_workflow()
        .register(sample_details())
        .unwrap();
    let id = registration.product_id.clone();
    assert!(id.as_str().starts_with("PROD-"));
    assert!(registration.block.is_genesis());

    fixture.advance(60_000);
    let oracle = ScriptedOracle::always(OracleVerdict::new(
        92,
        vec![
            Label::new("scratch", 3),
            Label::new("widget", 92),
            Label::new("gadget", 4),
            Label::new("cog", 1),
        ],
    ));
    let outcome = fixture
        .inspection_workflow(oracle)
        .inspect(&id, "inspector-1", b"jpeg bytes")
        .await
        .unwrap();

    assert!(outcome.record.passed);
    assert_eq!(outcome.record.inspection_id, format!("INSP-{}", fixture.now()));
    assert_eq!(
        outcome.record.labels,
        vec![
            Label::new("widget", 92),
            Label::new("gadget", 4),
            Label::new("scratch", 3),
        ]
    );
    assert!(outcome.summary.contains("widget (92% confidence)"));
    assert_eq!(outcome.block.sequence_number(), 1);

    fixture.advance(60_000);
    let report = fixture.verification_workflow().verify_product(&id).unwrap();
    assert!(report.is_authentic());
    assert_eq!(report.blocks, 2);
    assert_eq!(report.latest_inspection().unwrap().score, 92);
    assert_eq!(report.tail, Some(*outcome.block.hash()));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["result"]["ok"], true);
    assert_eq!(json["registration"]["manufacturer"], "Acme");
    assert!(json.get("query_block").is_none());

    let query = report.query_block.as_ref().unwrap();
    assert_eq!(query.sequence_number(), 2);
    assert_eq!(query.record().kind(), RecordKind::VerificationQuery);

    let history = fixture.verification_workflow().history(&id).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.verify().ok);

    let stats = fixture.registry.stats();
    assert_eq!(stats.registrations, 1);
    assert_eq!(stats.inspections, 1);
    assert_eq!(stats.verifications, 1);
    assert_eq!(stats.pass_rate(), Some(1.0));
}

#[tokio::test]
async fn low_score_fails_inspection() {
    let fixture = TestFixture::new();
    fixture.register("P1");

    let outcome = fixture
        .inspection_workflow(ScriptedOracle::scoring(40))
        .inspect(&product_id("P1"), "inspector-2", b"img")
        .await
        .unwrap();

    assert!(!outcome.record.passed);
    assert!(outcome.summary.contains("Requires manual review"));

    let report = fixture
        .verification_workflow()
        .verify_product(&product_id("P1"))
        .unwrap();
    assert!(report.summary().ends_with("latest failed (score 40)"));
}

#[tokio::test]
async fn threshold_is_inclusive() {
    let fixture = TestFixture::new().with_config(QualitraceConfig {
        pass_threshold: 80,
        ..Default::default()
    });
    fixture.register("P1");
    let workflow = fixture.inspection_workflow(Arc::new(ScriptedOracle::sequence(vec![
        Ok(OracleVerdict::new(80, vec![])),
        Ok(OracleVerdict::new(79, vec![])),
    ])));

    let id = product_id("P1");
    assert!(workflow.inspect(&id, "a", b"img").await.unwrap().record.passed);
    fixture.advance(1);
    assert!(!workflow.inspect(&id, "a", b"img").await.unwrap().record.passed);
}

#[tokio::test]
async fn inspecting_unregistered_product_is_refused() {
    let fixture = TestFixture::new();
    let oracle = Arc::new(ScriptedOracle::scoring(92));
    let id = product_id("P404");

    let err = fixture
        .inspection_workflow(oracle.clone())
        .inspect(&id, "inspector-1", b"img")
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::UnregisteredProduct(_)));
    assert_eq!(oracle.calls(), 0);
    assert!(fixture.registry.get(&id).is_none());
}

#[tokio::test]
async fn oracle_failures_leave_ledger_untouched() {
    let fixture = TestFixture::new();
    fixture.register("P1");
    let id = product_id("P1");

    let workflow = fixture.inspection_workflow(ScriptedOracle::sequence(vec![
        Err(OracleError::Unavailable("model not loaded".into())),
        Ok(OracleVerdict::new(101, vec![])),
        Ok(OracleVerdict::new(90, vec![Label::new("widget", 250)])),
    ]));

    let err = workflow.inspect(&id, "a", b"img").await.unwrap_err();
    assert!(matches!(err, LedgerError::Oracle(OracleError::Unavailable(_))));

    let err = workflow.inspect(&id, "a", b"img").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidVerdict(_)));

    let err = workflow.inspect(&id, "a", b"img").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidVerdict(_)));

    let err = workflow.inspect(&id, "a", b"").await.unwrap_err();
    assert!(matches!(err, LedgerError::Oracle(OracleError::InvalidInput(_))));

    assert_eq!(fixture.registry.get(&id).unwrap().len(), 1);
}

#[test]
fn duplicate_registration_is_refused() {
    let fixture = TestFixture::new();
    let workflow = fixture.registration_workflow();
    let id = product_id("P1");

    workflow.register_with_id(id.clone(), sample_details()).unwrap();
    let err = workflow
        .register_with_id(id.clone(), sample_details())
        .unwrap_err();

    assert!(matches!(err, LedgerError::AlreadyRegistered(_)));
    assert_eq!(fixture.registry.get(&id).unwrap().len(), 1);
}

#[test]
fn verify_unknown_product() {
    let fixture = TestFixture::new();
    let err = fixture
        .verification_workflow()
        .verify_product(&product_id("nope"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownSubject(_)));
}

#[test]
fn concurrent_appends_form_one_chain() {
    init_tracing();
    let fixture = TestFixture::new();
    fixture.register("P1");
    let id = product_id("P1");

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = fixture.registry.clone();
            let id = id.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let record = sample_inspection("P1", &format!("I{}-{}", t, i), 90, 75);
                    registry.append_record(&id, record.into()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = fixture.registry.get(&id).unwrap().iterate();
    assert_eq!(snapshot.len(), 201);
    for (i, block) in snapshot.iter().enumerate() {
        assert_eq!(block.sequence_number(), i as u64);
    }
    assert!(snapshot.verify().ok);
}

#[test]
fn optimistic_appends_retry_on_stale_tail() {
    let fixture = TestFixture::new();
    fixture.register("P1");
    let ledger = fixture.registry.get(&product_id("P1")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let mut retries = 0;
                for i in 0..20 {
                    let record: Record =
                        sample_inspection("P1", &format!("I{}-{}", t, i), 90, 75).into();
                    loop {
                        match ledger.append_after(ledger.tail_hash(), record.clone()) {
                            Ok(_) => break,
                            Err(e) if e.is_retryable() => retries += 1,
                            Err(e) => panic!("append failed: {}", e),
                        }
                    }
                }
                retries
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.len(), 81);
    assert!(ledger.verify().ok);

    let stale = ledger.append_after(None, sample_inspection("P1", "late", 90, 75).into());
    assert!(matches!(stale, Err(LedgerError::StaleTail { .. })));
    assert_eq!(ledger.len(), 81);
}

#[test]
fn snapshots_are_isolated_from_later_appends() {
    let fixture = TestFixture::new();
    fixture.register("P1");
    let id = product_id("P1");

    let before = fixture.registry.get(&id).unwrap().iterate();
    fixture.inspect("P1", "I1", 92);

    assert_eq!(before.len(), 1);
    assert_eq!(before.inspections().count(), 0);
    assert_eq!(fixture.registry.get(&id).unwrap().len(), 2);
}
