//! # Qualitrace Core
//!
//! Pure primitives for the Qualitrace ledger: records, canonical encoding,
//! hash-chained blocks and chain verification.
//!
//! This crate contains no I/O, no storage, no clocks. It is pure computation
//! over hash-linked data structures.
//!
//! ## Key Types
//!
//! - [`Record`] - The payload of one ledger event
//! - [`Block`] - A sealed, immutable, hash-linked entry
//! - [`BlockRecord`] - The untrusted stored form of a block
//! - [`Digest`] - SHA-256 digest used for block hashes
//! - [`SubjectId`] - Identifier of the product a chain belongs to
//!
//! ## Canonicalization
//!
//! Block hashes are computed over deterministic CBOR. See [`canonical`] module.

pub mod block;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod record;
pub mod types;
pub mod verify;

pub use block::{Block, BlockRecord};
pub use canonical::{canonical_block_bytes, canonical_record_bytes, decode_record, BLOCK_DOMAIN};
pub use digest::{digest, Digest, DIGEST_LEN};
pub use error::{EncodingError, FailureReason, IntegrityError};
pub use record::{
    Label, ProductRegistration, QualityInspection, Record, RecordKind, VerificationQuery, MAX_SCORE,
};
pub use types::SubjectId;
pub use verify::{verify, verify_segment, ChainLink, VerificationResult};
