//! Ledger: the append-only chain of blocks for one subject.
//!
//! Appends are serialized by a per-ledger writer lock. The block list itself
//! is a copy-on-write `Arc<Vec<_>>` behind an `RwLock` that is held only long
//! enough to clone the pointer or push one block, so readers never wait on
//! hashing and always see whole blocks.
//!
//! Appends are copy-on-write. With no live [`Snapshot`] the push is in place
//! and amortized O(1). While a snapshot is held, the next append clones the
//! block list once (O(n) pointer copies, not block copies). Later appends
//! push in place again until another snapshot is taken.

use std::fmt;
use std::slice;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use qualitrace_core::{
    verify, Block, BlockRecord, Digest, IntegrityError, ProductRegistration, QualityInspection,
    Record, SubjectId, VerificationResult,
};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};

type Blocks = Arc<Vec<Arc<Block>>>;

/// The chain of blocks for one subject.
pub struct Ledger {
    subject: SubjectId,
    clock: Arc<dyn Clock>,
    /// Held for the whole of an append: read tail, seal, publish.
    writer: Mutex<()>,
    blocks: RwLock<Blocks>,
}

impl Ledger {
    /// Create an empty ledger using wall-clock timestamps.
    pub fn new(subject: SubjectId) -> Self {
        Self::with_clock(subject, Arc::new(SystemClock))
    }

    /// Create an empty ledger with an injected clock.
    pub fn with_clock(subject: SubjectId, clock: Arc<dyn Clock>) -> Self {
        Self {
            subject,
            clock,
            writer: Mutex::new(()),
            blocks: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Rebuild a ledger from stored blocks.
    ///
    /// The chain is verified first. Any failure is returned as
    /// [`LedgerError::Integrity`] and no ledger is built.
    pub fn restore(
        subject: SubjectId,
        records: Vec<BlockRecord>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let integrity = |source: IntegrityError| LedgerError::Integrity {
            subject: subject.clone(),
            source,
        };

        if let Some(source) = verify(&records).failure() {
            tracing::warn!(
                subject = %subject,
                index = source.index,
                reason = %source.reason,
                "refusing to restore corrupt chain"
            );
            return Err(integrity(source));
        }

        let mut blocks = Vec::with_capacity(records.len());
        for (index, stored) in records.into_iter().enumerate() {
            if stored.record.product_id() != subject.as_str() {
                return Err(LedgerError::SubjectMismatch {
                    subject: subject.clone(),
                    found: stored.record.product_id().to_string(),
                });
            }
            let block = Block::from_record(stored)
                .map_err(|e| integrity(IntegrityError::new(index, e.reason)))?;
            blocks.push(Arc::new(block));
        }

        tracing::info!(subject = %subject, blocks = blocks.len(), "restored ledger");

        Ok(Self {
            subject,
            clock,
            writer: Mutex::new(()),
            blocks: RwLock::new(Arc::new(blocks)),
        })
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Appends
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a record, linking it to the current tail.
    ///
    /// Concurrent appends to the same ledger are serialized. On error nothing
    /// is appended.
    pub fn append(&self, record: Record) -> Result<Arc<Block>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let tail = self.tail();
        self.seal_and_publish(tail.as_deref(), record)
    }

    /// Append only if the tail is still the one the caller last saw.
    ///
    /// `expected_tail` is the hash of the block the caller believes is last,
    /// or `None` for an empty ledger. If another append got in first this
    /// fails with [`LedgerError::StaleTail`]; re-read the tail and retry.
    pub fn append_after(
        &self,
        expected_tail: Option<Digest>,
        record: Record,
    ) -> Result<Arc<Block>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let tail = self.tail();
        let actual = tail.as_ref().map(|block| *block.hash());

        if actual != expected_tail {
            tracing::warn!(
                subject = %self.subject,
                expected = ?expected_tail,
                actual = ?actual,
                "stale tail"
            );
            return Err(LedgerError::StaleTail {
                subject: self.subject.clone(),
                expected: expected_tail,
                actual,
            });
        }

        self.seal_and_publish(tail.as_deref(), record)
    }

    /// Caller must hold the writer lock.
    fn seal_and_publish(&self, tail: Option<&Block>, record: Record) -> Result<Arc<Block>> {
        if record.product_id() != self.subject.as_str() {
            return Err(LedgerError::SubjectMismatch {
                subject: self.subject.clone(),
                found: record.product_id().to_string(),
            });
        }

        let (seq, previous_hash) = match tail {
            Some(block) => (block.sequence_number() + 1, *block.hash()),
            None => (0, Digest::ZERO),
        };

        // Hashing happens outside the list lock.
        let block = Arc::new(Block::seal(
            seq,
            self.clock.now_millis(),
            record,
            previous_hash,
        )?);

        {
            let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
            Arc::make_mut(&mut *blocks).push(Arc::clone(&block));
        }

        tracing::debug!(
            subject = %self.subject,
            seq,
            kind = %block.record().kind(),
            hash = %block.hash(),
            "appended block"
        );

        Ok(block)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    fn current(&self) -> Blocks {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*blocks)
    }

    /// The most recent block, or `None` if the ledger is empty.
    pub fn tail(&self) -> Option<Arc<Block>> {
        self.current().last().cloned()
    }

    /// Hash of the most recent block. Pass it to [`Ledger::append_after`].
    pub fn tail_hash(&self) -> Option<Digest> {
        self.tail().map(|block| *block.hash())
    }

    /// The block at sequence number `seq`.
    pub fn get(&self, seq: u64) -> Option<Arc<Block>> {
        let index = usize::try_from(seq).ok()?;
        self.current().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// A consistent point-in-time view of the chain.
    ///
    /// Appends made after the call are not visible through the snapshot.
    pub fn iterate(&self) -> Snapshot {
        Snapshot {
            subject: self.subject.clone(),
            blocks: self.current(),
        }
    }

    /// Verify the chain as of now.
    pub fn verify(&self) -> VerificationResult {
        self.iterate().verify()
    }

    /// Export every block in its storable form.
    pub fn export(&self) -> Vec<BlockRecord> {
        self.current().iter().map(|block| block.to_record()).collect()
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("subject", &self.subject)
            .field("len", &self.len())
            .field("tail", &self.tail_hash())
            .finish()
    }
}

/// Immutable view of a ledger at one point in time.
///
/// Cheap to clone and restartable: every call to [`Snapshot::iter`] walks
/// the same blocks from sequence 0.
#[derive(Clone)]
pub struct Snapshot {
    subject: SubjectId,
    blocks: Blocks,
}

impl Snapshot {
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<&Arc<Block>> {
        usize::try_from(seq).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn tail(&self) -> Option<&Arc<Block>> {
        self.blocks.last()
    }

    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    /// Blocks in ascending sequence order.
    pub fn iter(&self) -> slice::Iter<'_, Arc<Block>> {
        self.blocks.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.blocks.iter().map(|block| block.record())
    }

    /// The registration record, if the chain starts with one.
    pub fn registration(&self) -> Option<&ProductRegistration> {
        self.blocks
            .first()
            .and_then(|block| block.record().as_registration())
    }

    pub fn inspections(&self) -> impl Iterator<Item = &QualityInspection> {
        self.records().filter_map(Record::as_inspection)
    }

    pub fn verify(&self) -> VerificationResult {
        verify(self.blocks.as_slice())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<Block>;
    type IntoIter = slice::Iter<'a, Arc<Block>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("subject", &self.subject)
            .field("len", &self.blocks.len())
            .finish()
    }
}
