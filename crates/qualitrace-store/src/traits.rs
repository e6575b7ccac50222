//! Store trait: the abstract interface for chain persistence.
//!
//! The ledger itself is in-memory; a store is the external collaborator that
//! keeps chains across restarts. Nothing a store returns is trusted. Callers
//! rebuild ledgers from [`BlockRecord`]s and re-run verification first.

use async_trait::async_trait;
use qualitrace_core::{BlockRecord, Digest, SubjectId};

use crate::error::{Result, StoreError};

/// Result of inserting a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Block was inserted successfully.
    Inserted,
    /// The same block already exists (idempotent - not an error).
    AlreadyExists,
    /// Conflict: a different block exists at the same chain position.
    Conflict {
        /// Hash of the block already stored at this position.
        existing: Digest,
    },
}

/// The Store trait: async interface for chain persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Idempotent inserts**: Inserting the same block twice returns `AlreadyExists`.
/// - **Conflict detection**: Inserting a different block at an existing position
///   returns `Conflict` with the existing block hash.
/// - **No validation**: The store keeps what it is given. Linkage is checked
///   when a chain is loaded back into a ledger.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one block of a subject's chain.
    async fn insert_block(&self, subject: &SubjectId, block: &BlockRecord) -> Result<InsertResult>;

    /// Load a subject's full chain, ordered by sequence number.
    ///
    /// Unknown subjects yield an empty chain.
    async fn load_chain(&self, subject: &SubjectId) -> Result<Vec<BlockRecord>>;

    /// Get a block by its position in a chain.
    async fn get_block(&self, subject: &SubjectId, seq: u64) -> Result<Option<BlockRecord>>;

    /// Number of stored blocks for a subject.
    async fn chain_len(&self, subject: &SubjectId) -> Result<u64>;

    /// All subjects with at least one stored block, in ascending order.
    async fn list_subjects(&self) -> Result<Vec<SubjectId>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Insert every block of a chain, in order.
    ///
    /// Blocks that are already stored are skipped. Returns the number of newly
    /// inserted blocks. A conflicting block aborts with [`StoreError::Conflict`].
    fn insert_chain(
        &self,
        subject: &SubjectId,
        blocks: &[BlockRecord],
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn insert_chain(&self, subject: &SubjectId, blocks: &[BlockRecord]) -> Result<usize> {
        let mut inserted = 0;

        for block in blocks {
            match self.insert_block(subject, block).await? {
                InsertResult::Inserted => inserted += 1,
                InsertResult::AlreadyExists => {}
                InsertResult::Conflict { existing } => {
                    return Err(StoreError::Conflict {
                        subject: subject.clone(),
                        seq: block.seq,
                        existing,
                    });
                }
            }
        }

        Ok(inserted)
    }
}
