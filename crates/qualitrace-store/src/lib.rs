//! # Qualitrace Store
//!
//! Storage abstraction for Qualitrace ledgers. Provides a trait-based
//! interface for chain persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts chain storage behind the [`Store`] trait,
//! keeping the ledger storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting a block
//!
//! ## Usage
//!
//! ```rust,no_run
//! use qualitrace_store::{SqliteStore, Store};
//! use qualitrace_core::SubjectId;
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let subject = SubjectId::new("PROD-1").unwrap();
//!     let chain = store.load_chain(&subject).await.unwrap();
//!     assert!(chain.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting the same block twice returns `AlreadyExists`
//! - **Conflict detection**: Different block at same position returns `Conflict`
//! - **Canonical records**: SQLite keeps each record as canonical CBOR bytes
//! - **Untrusted reads**: Loaded chains are re-verified by the caller

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store, StoreExt};
