//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use qualitrace_core::{BlockRecord, SubjectId};

use crate::error::Result;
use crate::traits::{InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    /// Chains indexed by subject, blocks keyed by sequence number.
    chains: RwLock<HashMap<SubjectId, BTreeMap<u64, BlockRecord>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_block(&self, subject: &SubjectId, block: &BlockRecord) -> Result<InsertResult> {
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let chain = chains.entry(subject.clone()).or_default();

        if let Some(existing) = chain.get(&block.seq) {
            if existing == block {
                return Ok(InsertResult::AlreadyExists);
            }
            return Ok(InsertResult::Conflict {
                existing: existing.hash,
            });
        }

        chain.insert(block.seq, block.clone());
        Ok(InsertResult::Inserted)
    }

    async fn load_chain(&self, subject: &SubjectId) -> Result<Vec<BlockRecord>> {
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        Ok(chains
            .get(subject)
            .map(|chain| chain.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_block(&self, subject: &SubjectId, seq: u64) -> Result<Option<BlockRecord>> {
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        Ok(chains.get(subject).and_then(|chain| chain.get(&seq)).cloned())
    }

    async fn chain_len(&self, subject: &SubjectId) -> Result<u64> {
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        Ok(chains.get(subject).map_or(0, |chain| chain.len() as u64))
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        let mut subjects: Vec<SubjectId> = chains
            .iter()
            .filter(|(_, chain)| !chain.is_empty())
            .map(|(subject, _)| subject.clone())
            .collect();
        subjects.sort();
        Ok(subjects)
    }
}
