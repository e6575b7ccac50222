//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a registry on a manual clock,
//! sample records, a scripted inspection oracle and a store wrapper that
//! corrupts what it hands back.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use qualitrace::{
    Block, Clock, Digest, InspectionOracle, InspectionWorkflow, Label, LedgerRegistry,
    ManualClock, OracleError, OracleVerdict, ProductDetails, ProductRegistration, QualitraceConfig,
    QualityInspection, Record, RegistrationWorkflow, SubjectId, VerificationQuery,
    VerificationWorkflow,
};
use qualitrace_core::BlockRecord;
use qualitrace_store::{InsertResult, MemoryStore, Result as StoreResult, Store};

use crate::vectors::T0;

/// A test fixture: a registry driven by a manual clock.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub registry: Arc<LedgerRegistry>,
    pub config: QualitraceConfig,
}

impl TestFixture {
    /// Fixture whose clock starts at [`T0`].
    pub fn new() -> Self {
        Self::starting_at(T0)
    }

    pub fn starting_at(millis: i64) -> Self {
        let clock = Arc::new(ManualClock::new(millis));
        let registry = Arc::new(LedgerRegistry::with_clock(clock.clone()));
        Self {
            clock,
            registry,
            config: QualitraceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: QualitraceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: i64) {
        self.clock.advance(millis);
    }

    /// Parse a product id, panicking on invalid input.
    pub fn product_id(&self, id: &str) -> SubjectId {
        product_id(id)
    }

    /// Append a sample registration for `id`.
    pub fn register(&self, id: &str) -> Arc<Block> {
        let block = self
            .registry
            .append_record(&product_id(id), sample_registration(id).into());
        block.unwrap_or_else(|e| panic!("register {}: {}", id, e))
    }

    /// Append an inspection of `id` with the given score.
    pub fn inspect(&self, id: &str, inspection_id: &str, score: u8) -> Arc<Block> {
        let record = sample_inspection(id, inspection_id, score, self.config.pass_threshold);
        let block = self.registry.append_record(&product_id(id), record.into());
        block.unwrap_or_else(|e| panic!("inspect {}: {}", id, e))
    }

    pub fn registration_workflow(&self) -> RegistrationWorkflow {
        RegistrationWorkflow::new(self.registry.clone())
    }

    pub fn inspection_workflow<O: InspectionOracle>(&self, oracle: O) -> InspectionWorkflow<O> {
        InspectionWorkflow::new(self.registry.clone(), oracle, self.config.clone())
            .unwrap_or_else(|e| panic!("inspection workflow: {}", e))
    }

    pub fn verification_workflow(&self) -> VerificationWorkflow {
        VerificationWorkflow::new(self.registry.clone(), self.config.clone())
            .unwrap_or_else(|e| panic!("verification workflow: {}", e))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture with `count` registered products named `P0`, `P1`, ...
pub fn multi_product_fixtures(count: usize) -> (TestFixture, Vec<SubjectId>) {
    let fixture = TestFixture::new();
    let ids = (0..count)
        .map(|i| {
            let id = format!("P{}", i);
            fixture.register(&id);
            fixture.advance(1_000);
            product_id(&id)
        })
        .collect();
    (fixture, ids)
}

pub fn product_id(id: &str) -> SubjectId {
    SubjectId::new(id).unwrap_or_else(|e| panic!("invalid product id {:?}: {}", id, e))
}

pub fn sample_details() -> ProductDetails {
    ProductDetails {
        name: "Widget".into(),
        manufacturer: "Acme".into(),
        category: "Industrial".into(),
        batch_number: "B1".into(),
        manufacture_date: "2024-01-15".into(),
    }
}

pub fn sample_registration(product_id: &str) -> ProductRegistration {
    let details = sample_details();
    ProductRegistration {
        product_id: product_id.into(),
        name: details.name,
        manufacturer: details.manufacturer,
        category: details.category,
        batch_number: details.batch_number,
        manufacture_date: details.manufacture_date,
    }
}

pub fn sample_inspection(
    product_id: &str,
    inspection_id: &str,
    score: u8,
    pass_threshold: u8,
) -> QualityInspection {
    QualityInspection {
        inspection_id: inspection_id.into(),
        product_id: product_id.into(),
        inspector: "inspector-1".into(),
        score,
        passed: score >= pass_threshold,
        labels: vec![Label::new("ok", score)],
    }
}

pub fn sample_query(product_id: &str, queried_at: i64) -> VerificationQuery {
    VerificationQuery {
        product_id: product_id.into(),
        queried_at,
        result_summary: "authentic".into(),
    }
}

/// Seal a chain of `records`, one block per minute from `start`.
pub fn build_chain(start: i64, records: impl IntoIterator<Item = Record>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for (seq, record) in records.into_iter().enumerate() {
        let prev = blocks.last().map_or(Digest::ZERO, |b| *b.hash());
        let ts = start + seq as i64 * 60_000;
        match Block::seal(seq as u64, ts, record, prev) {
            Ok(block) => blocks.push(block),
            Err(e) => panic!("sealing block {}: {}", seq, e),
        }
    }
    blocks
}

/// Registration followed by one inspection per score.
pub fn product_chain(product_id: &str, scores: &[u8]) -> Vec<Block> {
    let records = std::iter::once(sample_registration(product_id).into()).chain(
        scores.iter().enumerate().map(|(i, &score)| {
            sample_inspection(product_id, &format!("I{}", i + 1), score, 75).into()
        }),
    );
    build_chain(T0, records)
}

pub fn to_records(blocks: &[Block]) -> Vec<BlockRecord> {
    blocks.iter().map(Block::to_record).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted oracle
// ─────────────────────────────────────────────────────────────────────────────

/// Oracle that replays a script of answers, then a fallback.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<OracleVerdict, OracleError>>>,
    fallback: Option<OracleVerdict>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    /// Answer every call with `verdict`.
    pub fn always(verdict: OracleVerdict) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(verdict),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with `answers` in order, then report the oracle unavailable.
    pub fn sequence(answers: Vec<Result<OracleVerdict, OracleError>>) -> Self {
        Self {
            script: Mutex::new(answers.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Single label verdict with the given score.
    pub fn scoring(score: u8) -> Self {
        Self::always(OracleVerdict::new(score, vec![Label::new("widget", score)]))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InspectionOracle for ScriptedOracle {
    async fn classify(&self, image: &[u8]) -> Result<OracleVerdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.is_empty() {
            return Err(OracleError::InvalidInput("empty image".into()));
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match (next, &self.fallback) {
            (Some(answer), _) => answer,
            (None, Some(verdict)) => Ok(verdict.clone()),
            (None, None) => Err(OracleError::Unavailable("script exhausted".into())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Corrupting store
// ─────────────────────────────────────────────────────────────────────────────

/// An edit applied to a stored block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tamper {
    Seq(u64),
    Timestamp(i64),
    Record(Record),
    PreviousHash(Digest),
    Hash(Digest),
    /// Change an inspection's score, leaving everything else intact.
    Score(u8),
}

impl Tamper {
    pub fn apply(&self, block: &mut BlockRecord) {
        match self {
            Tamper::Seq(seq) => block.seq = *seq,
            Tamper::Timestamp(ts) => block.timestamp = *ts,
            Tamper::Record(record) => block.record = record.clone(),
            Tamper::PreviousHash(hash) => block.previous_hash = *hash,
            Tamper::Hash(hash) => block.hash = *hash,
            Tamper::Score(score) => {
                if let Record::QualityInspection(inspection) = &mut block.record {
                    inspection.score = *score;
                }
            }
        }
    }
}

/// Store wrapper that tampers with blocks as they are read back.
///
/// Writes go to the inner store untouched, so the corruption only shows
/// up on load. Useful for checking that restores verify what they read.
pub struct CorruptingStore<S = MemoryStore> {
    inner: S,
    tampers: Mutex<HashMap<(SubjectId, u64), Vec<Tamper>>>,
}

impl<S: Store> CorruptingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tampers: Mutex::new(HashMap::new()),
        }
    }

    /// Tamper with block `seq` of `subject` on every subsequent read.
    ///
    /// Tampers on the same block are applied in the order they were added.
    pub fn corrupt(&self, subject: &SubjectId, seq: u64, tamper: Tamper) {
        self.tampers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((subject.clone(), seq))
            .or_default()
            .push(tamper);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn apply(&self, subject: &SubjectId, block: &mut BlockRecord) {
        let tampers = self.tampers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(edits) = tampers.get(&(subject.clone(), block.seq)) {
            for tamper in edits {
                tamper.apply(block);
            }
        }
    }
}

#[async_trait]
impl<S: Store> Store for CorruptingStore<S> {
    async fn insert_block(
        &self,
        subject: &SubjectId,
        block: &BlockRecord,
    ) -> StoreResult<InsertResult> {
        self.inner.insert_block(subject, block).await
    }

    async fn load_chain(&self, subject: &SubjectId) -> StoreResult<Vec<BlockRecord>> {
        let mut chain = self.inner.load_chain(subject).await?;
        for block in &mut chain {
            self.apply(subject, block);
        }
        Ok(chain)
    }

    async fn get_block(&self, subject: &SubjectId, seq: u64) -> StoreResult<Option<BlockRecord>> {
        let mut block = self.inner.get_block(subject, seq).await?;
        if let Some(block) = &mut block {
            self.apply(subject, block);
        }
        Ok(block)
    }

    async fn chain_len(&self, subject: &SubjectId) -> StoreResult<u64> {
        self.inner.chain_len(subject).await
    }

    async fn list_subjects(&self) -> StoreResult<Vec<SubjectId>> {
        self.inner.list_subjects().await
    }
}
