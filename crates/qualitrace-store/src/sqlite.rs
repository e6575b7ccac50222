//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Qualitrace. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use qualitrace_core::{canonical_record_bytes, decode_record, BlockRecord, Digest, SubjectId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        tracing::info!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

/// Column values of one stored block, before decoding.
struct BlockRow {
    seq: u64,
    timestamp: i64,
    record: Vec<u8>,
    previous_hash: Vec<u8>,
    hash: Vec<u8>,
}

const SELECT_COLUMNS: &str = "SELECT seq, timestamp, record, previous_hash, hash FROM blocks";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok(BlockRow {
        seq: row.get("seq")?,
        timestamp: row.get("timestamp")?,
        record: row.get("record")?,
        previous_hash: row.get("previous_hash")?,
        hash: row.get("hash")?,
    })
}

fn digest_column(column: &str, bytes: &[u8]) -> Result<Digest> {
    Digest::try_from(bytes).map_err(|_| {
        StoreError::InvalidData(format!(
            "column {} holds {} bytes, expected 32",
            column,
            bytes.len()
        ))
    })
}

impl BlockRow {
    /// Decode the row found at position `index` of `subject`'s chain.
    fn into_block_record(self, subject: &SubjectId, index: usize) -> Result<BlockRecord> {
        let seq = self.seq;
        let corrupt = |reason: String| {
            tracing::warn!(
                subject = %subject,
                seq,
                index,
                reason = %reason,
                "corrupt stored block"
            );
            StoreError::Corrupt {
                subject: subject.clone(),
                seq,
                index,
                reason,
            }
        };

        let record = decode_record(&self.record).map_err(|e| corrupt(e.to_string()))?;
        let previous_hash = digest_column("previous_hash", &self.previous_hash)
            .map_err(|e| corrupt(e.to_string()))?;
        let hash = digest_column("hash", &self.hash).map_err(|e| corrupt(e.to_string()))?;

        Ok(BlockRecord {
            seq,
            timestamp: self.timestamp,
            record,
            previous_hash,
            hash,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_block(&self, subject: &SubjectId, block: &BlockRecord) -> Result<InsertResult> {
        let subject = subject.clone();
        let block = block.clone();
        let record_bytes = canonical_record_bytes(&block.record)?;

        self.run(move |conn| {
            let existing = conn
                .query_row(
                    &format!("{} WHERE subject_id = ?1 AND seq = ?2", SELECT_COLUMNS),
                    params![subject.as_str(), block.seq],
                    read_row,
                )
                .optional()?;

            if let Some(row) = existing {
                let same = row.hash[..] == block.hash.as_bytes()[..]
                    && row.previous_hash[..] == block.previous_hash.as_bytes()[..]
                    && row.timestamp == block.timestamp
                    && row.record == record_bytes;

                if same {
                    return Ok(InsertResult::AlreadyExists);
                }
                return Ok(InsertResult::Conflict {
                    existing: digest_column("hash", &row.hash)?,
                });
            }

            conn.execute(
                "INSERT INTO blocks (
                    subject_id, seq, timestamp, kind, record,
                    previous_hash, hash, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    subject.as_str(),
                    block.seq,
                    block.timestamp,
                    block.record.kind().as_str(),
                    record_bytes,
                    block.previous_hash.as_bytes().as_slice(),
                    block.hash.as_bytes().as_slice(),
                    now_millis(),
                ],
            )?;

            tracing::debug!(subject = %subject, seq = block.seq, "stored block");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn load_chain(&self, subject: &SubjectId) -> Result<Vec<BlockRecord>> {
        let subject = subject.clone();

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE subject_id = ?1 ORDER BY seq ASC",
                SELECT_COLUMNS
            ))?;

            let rows = stmt
                .query_map(params![subject.as_str()], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .enumerate()
                .map(|(index, row)| row.into_block_record(&subject, index))
                .collect()
        })
        .await
    }

    async fn get_block(&self, subject: &SubjectId, seq: u64) -> Result<Option<BlockRecord>> {
        let subject = subject.clone();

        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!("{} WHERE subject_id = ?1 AND seq = ?2", SELECT_COLUMNS),
                    params![subject.as_str(), seq],
                    read_row,
                )
                .optional()?;

            // A lone block is checked in isolation, so it reports index 0.
            row.map(|row| row.into_block_record(&subject, 0)).transpose()
        })
        .await
    }

    async fn chain_len(&self, subject: &SubjectId) -> Result<u64> {
        let subject = subject.clone();

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM blocks WHERE subject_id = ?1",
                params![subject.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT subject_id FROM blocks ORDER BY subject_id ASC")?;

            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            ids.into_iter()
                .map(|id| {
                    SubjectId::new(id)
                        .map_err(|e| StoreError::InvalidData(format!("subject_id: {}", e)))
                })
                .collect()
        })
        .await
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qualitrace_core::{
        verify, Block, FailureReason, Label, ProductRegistration, QualityInspection, Record,
        VerificationResult,
    };

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn inspection(product_id: &str, seq: u64, score: u8) -> Record {
        QualityInspection {
            inspection_id: format!("I{}", seq),
            product_id: product_id.into(),
            inspector: "inspector-1".into(),
            score,
            passed: score >= 75,
            labels: vec![Label::new("surface ok", score)],
        }
        .into()
    }

    fn make_test_chain(product_id: &str, len: u64) -> Vec<BlockRecord> {
        let mut blocks: Vec<Block> = Vec::new();
        for seq in 0..len {
            let record: Record = if seq == 0 {
                ProductRegistration {
                    product_id: product_id.into(),
                    name: "Widget".into(),
                    manufacturer: "Acme".into(),
                    category: "Industrial".into(),
                    batch_number: "B1".into(),
                    manufacture_date: "2024-01-15".into(),
                }
                .into()
            } else {
                inspection(product_id, seq, 92)
            };
            let prev = blocks.last().map(|b| *b.hash()).unwrap_or(Digest::ZERO);
            blocks.push(Block::seal(seq, 1_700_000_000_000 + seq as i64, record, prev).unwrap());
        }
        blocks.iter().map(Block::to_record).collect()
    }

    async fn insert_all(store: &SqliteStore, id: &str, chain: &[BlockRecord]) {
        for block in chain {
            let result = store.insert_block(&subject(id), block).await.unwrap();
            assert_eq!(result, InsertResult::Inserted);
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_chain() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 3);

        // Insert out of order; loading must still return ascending seq.
        for i in [2usize, 0, 1] {
            store.insert_block(&subject("P1"), &chain[i]).await.unwrap();
        }

        let loaded = store.load_chain(&subject("P1")).await.unwrap();
        assert_eq!(loaded, chain);
        assert!(verify(&loaded).ok);
        assert_eq!(store.chain_len(&subject("P1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_block() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 2);
        insert_all(&store, "P1", &chain).await;

        let block = store.get_block(&subject("P1"), 1).await.unwrap();
        assert_eq!(block, Some(chain[1].clone()));
        assert_eq!(store.get_block(&subject("P1"), 5).await.unwrap(), None);
        assert_eq!(store.get_block(&subject("P2"), 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_idempotent_insert() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 1);

        let r1 = store.insert_block(&subject("P1"), &chain[0]).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted);

        let r2 = store.insert_block(&subject("P1"), &chain[0]).await.unwrap();
        assert_eq!(r2, InsertResult::AlreadyExists);
    }

    #[tokio::test]
    async fn test_conflict_detection() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 2);
        insert_all(&store, "P1", &chain).await;

        // A different block at seq 1.
        let forged = Block::seal(1, 5, inspection("P1", 1, 10), chain[0].hash).unwrap();
        let result = store
            .insert_block(&subject("P1"), &forged.to_record())
            .await
            .unwrap();

        assert_eq!(
            result,
            InsertResult::Conflict {
                existing: chain[1].hash
            }
        );
    }

    #[tokio::test]
    async fn test_list_subjects() {
        let store = SqliteStore::open_memory().unwrap();
        insert_all(&store, "P2", &make_test_chain("P2", 1)).await;
        insert_all(&store, "P1", &make_test_chain("P1", 2)).await;

        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects, vec![subject("P1"), subject("P2")]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let chain = make_test_chain("P1", 4);

        {
            let store = SqliteStore::open(&path).unwrap();
            insert_all(&store, "P1", &chain).await;
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_chain(&subject("P1")).await.unwrap();
        assert_eq!(loaded, chain);
    }

    #[tokio::test]
    async fn test_tampered_row_detected_by_verify() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 3);
        insert_all(&store, "P1", &chain).await;

        // Rewrite the stored record with a valid encoding of different content.
        let tampered = canonical_record_bytes(&inspection("P1", 1, 40)).unwrap();
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE blocks SET record = ?1 WHERE subject_id = 'P1' AND seq = 1",
                params![tampered],
            )
            .unwrap();
        }

        let loaded = store.load_chain(&subject("P1")).await.unwrap();
        assert_eq!(
            verify(&loaded),
            VerificationResult::failed(1, FailureReason::HashMismatch)
        );
    }

    #[tokio::test]
    async fn test_garbage_record_is_corrupt() {
        let store = SqliteStore::open_memory().unwrap();
        insert_all(&store, "P1", &make_test_chain("P1", 1)).await;

        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE blocks SET record = X'A1616B01' WHERE subject_id = 'P1'",
                [],
            )
            .unwrap();
        }

        let err = store.load_chain(&subject("P1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { seq: 0, index: 0, .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_corrupt_at_its_index() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = make_test_chain("P1", 3);
        insert_all(&store, "P1", &chain).await;

        // Score 92 is encoded as 18 5c; 18 c8 decodes to 200.
        let mut bytes = canonical_record_bytes(&chain[1].record).unwrap();
        let at = bytes.windows(2).position(|w| w == [0x18, 0x5c]).unwrap();
        bytes[at + 1] = 0xc8;
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE blocks SET record = ?1 WHERE subject_id = 'P1' AND seq = 1",
                params![bytes],
            )
            .unwrap();
        }

        let err = store.load_chain(&subject("P1")).await.unwrap_err();
        match err {
            StoreError::Corrupt {
                subject: s,
                seq,
                index,
                ..
            } => {
                assert_eq!(s, subject("P1"));
                assert_eq!(seq, 1);
                assert_eq!(index, 1);
            }
            other => panic!("expected corrupt block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_hash_is_corrupt() {
        let store = SqliteStore::open_memory().unwrap();
        insert_all(&store, "P1", &make_test_chain("P1", 1)).await;

        {
            let conn = lock(&store.conn).unwrap();
            conn.execute("UPDATE blocks SET hash = X'00FF' WHERE seq = 0", [])
                .unwrap();
        }

        let err = store.get_block(&subject("P1"), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { seq: 0, .. }));
    }
}
