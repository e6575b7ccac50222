//! Ledger registry: one ledger per subject.
//!
//! The registry is an explicit, injectable object. It is created once per
//! process, grows as new subjects are appended to, and never deletes a
//! ledger. Its map lock only guards lookups and inserts of ledger handles;
//! appends run against the ledger itself, so distinct subjects never
//! contend with each other.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use qualitrace_core::{Block, Record, SubjectId, VerificationResult};
use qualitrace_store::{Store, StoreExt};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;

/// Mapping from subject to its ledger.
pub struct LedgerRegistry {
    ledgers: RwLock<HashMap<SubjectId, Arc<Ledger>>>,
    clock: Arc<dyn Clock>,
}

/// Aggregate counts across every ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub subjects: usize,
    pub blocks: usize,
    pub registrations: usize,
    pub inspections: usize,
    pub passed: usize,
    pub failed: usize,
    pub verifications: usize,
}

impl RegistryStats {
    /// Share of inspections that passed, `None` before the first inspection.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.inspections == 0 {
            None
        } else {
            Some(self.passed as f64 / self.inspections as f64)
        }
    }
}

impl LedgerRegistry {
    /// Create an empty registry using wall-clock timestamps.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry whose ledgers share `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get the ledger for `subject`, creating an empty one if needed.
    ///
    /// Idempotent: every call for the same subject returns the same ledger.
    pub fn resolve(&self, subject: &SubjectId) -> Arc<Ledger> {
        if let Some(ledger) = self.get(subject) {
            return ledger;
        }

        let mut ledgers = self.ledgers.write().unwrap_or_else(PoisonError::into_inner);
        let ledger = ledgers.entry(subject.clone()).or_insert_with(|| {
            tracing::info!(subject = %subject, "created ledger");
            Arc::new(Ledger::with_clock(subject.clone(), Arc::clone(&self.clock)))
        });
        Arc::clone(ledger)
    }

    /// The ledger for `subject`, if one exists.
    pub fn get(&self, subject: &SubjectId) -> Option<Arc<Ledger>> {
        let ledgers = self.ledgers.read().unwrap_or_else(PoisonError::into_inner);
        ledgers.get(subject).cloned()
    }

    /// Append a record to the subject's ledger.
    ///
    /// The record is checked before the ledger is resolved, so a rejected
    /// record never leaves an empty ledger behind.
    pub fn append_record(&self, subject: &SubjectId, record: Record) -> Result<Arc<Block>> {
        if record.product_id() != subject.as_str() {
            return Err(LedgerError::SubjectMismatch {
                subject: subject.clone(),
                found: record.product_id().to_string(),
            });
        }
        record.validate()?;

        self.resolve(subject).append(record)
    }

    /// Verify the subject's chain.
    pub fn verify_subject(&self, subject: &SubjectId) -> Result<VerificationResult> {
        let ledger = self
            .get(subject)
            .ok_or_else(|| LedgerError::UnknownSubject(subject.clone()))?;
        Ok(ledger.verify())
    }

    /// Verify the subject's chain and return its ledger only if intact.
    pub fn require_intact(&self, subject: &SubjectId) -> Result<Arc<Ledger>> {
        let ledger = self
            .get(subject)
            .ok_or_else(|| LedgerError::UnknownSubject(subject.clone()))?;

        if let Some(source) = ledger.verify().failure() {
            tracing::warn!(
                subject = %subject,
                index = source.index,
                reason = %source.reason,
                "integrity failure"
            );
            return Err(LedgerError::Integrity {
                subject: subject.clone(),
                source,
            });
        }

        Ok(ledger)
    }

    /// All known subjects, sorted.
    pub fn subjects(&self) -> Vec<SubjectId> {
        let ledgers = self.ledgers.read().unwrap_or_else(PoisonError::into_inner);
        let mut subjects: Vec<SubjectId> = ledgers.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn len(&self) -> usize {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handles(&self) -> Vec<(SubjectId, Arc<Ledger>)> {
        let ledgers = self.ledgers.read().unwrap_or_else(PoisonError::into_inner);
        let mut handles: Vec<_> = ledgers
            .iter()
            .map(|(subject, ledger)| (subject.clone(), Arc::clone(ledger)))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    /// Dashboard counts computed from ledger contents.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();

        for (_, ledger) in self.handles() {
            let snapshot = ledger.iterate();
            stats.subjects += 1;
            stats.blocks += snapshot.len();

            for record in snapshot.records() {
                match record {
                    Record::ProductRegistration(_) => stats.registrations += 1,
                    Record::QualityInspection(r) => {
                        stats.inspections += 1;
                        if r.passed {
                            stats.passed += 1;
                        } else {
                            stats.failed += 1;
                        }
                    }
                    Record::VerificationQuery(_) => stats.verifications += 1,
                }
            }
        }

        stats
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Write every chain to `store`. Returns the number of newly stored blocks.
    pub async fn persist<S: Store + ?Sized>(&self, store: &S) -> Result<usize> {
        let mut inserted = 0;

        for (subject, ledger) in self.handles() {
            inserted += store.insert_chain(&subject, &ledger.export()).await?;
        }

        tracing::info!(subjects = self.len(), inserted, "persisted registry");
        Ok(inserted)
    }

    /// Rebuild a registry from `store`.
    ///
    /// Every chain is verified before it is trusted. The first corrupt chain
    /// aborts the restore with [`LedgerError::Integrity`].
    pub async fn restore<S: Store + ?Sized>(store: &S, clock: Arc<dyn Clock>) -> Result<Self> {
        let registry = Self::with_clock(clock);

        for subject in store.list_subjects().await? {
            let records = store.load_chain(&subject).await?;
            let ledger = Ledger::restore(subject.clone(), records, Arc::clone(&registry.clock))?;

            registry
                .ledgers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(subject, Arc::new(ledger));
        }

        tracing::info!(subjects = registry.len(), "restored registry");
        Ok(registry)
    }
}

impl Default for LedgerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LedgerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerRegistry")
            .field("subjects", &self.len())
            .finish()
    }
}
