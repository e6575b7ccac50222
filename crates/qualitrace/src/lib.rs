//! # Qualitrace
//!
//! The unified API for Qualitrace: tamper-evident, append-only product
//! histories built from hash-chained blocks.
//!
//! ## Overview
//!
//! Qualitrace keeps one ledger per product and lets downstream workflows
//! prove that the history they show has not been altered:
//!
//! - **Registration**: A manufacturer opens a product's ledger (block 0)
//! - **Inspection**: An inspector's verdict, scored by an image oracle
//! - **Verification**: A consumer checks the chain and gets the history
//!
//! ## Key Concepts
//!
//! - **Block**: Immutable. Its hash covers sequence, timestamp, record and
//!   the previous block's hash.
//! - **Ledger**: Append-only chain for one subject. Never reordered or truncated.
//! - **Registry**: One ledger per subject, shared by all workflows.
//! - **Tamper evidence**: Any edit to a stored block breaks verification at
//!   that block.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qualitrace::{
//!     LedgerRegistry, ProductDetails, QualitraceConfig, RegistrationWorkflow,
//!     VerificationWorkflow,
//! };
//!
//! let registry = Arc::new(LedgerRegistry::new());
//!
//! let registration = RegistrationWorkflow::new(registry.clone())
//!     .register(ProductDetails {
//!         name: "Widget".into(),
//!         manufacturer: "Acme".into(),
//!         category: "Industrial".into(),
//!         batch_number: "B1".into(),
//!         manufacture_date: "2024-01-15".into(),
//!     })
//!     .unwrap();
//!
//! let report = VerificationWorkflow::new(registry, QualitraceConfig::default())
//!     .unwrap()
//!     .verify_product(&registration.product_id)
//!     .unwrap();
//! assert!(report.is_authentic());
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `qualitrace::core` - Core primitives (Record, Block, Digest, verify)
//! - `qualitrace::store` - Storage abstraction and SQLite

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod inspection;
pub mod ledger;
pub mod oracle;
pub mod registration;
pub mod registry;
pub mod verification;

// Re-export component crates
pub use qualitrace_core as core;
pub use qualitrace_store as store;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, QualitraceConfig};
pub use error::{LedgerError, Result};
pub use ids::{generate_inspection_id, generate_product_id};
pub use inspection::{InspectionOutcome, InspectionWorkflow};
pub use ledger::{Ledger, Snapshot};
pub use oracle::{InspectionOracle, OracleError, OracleVerdict};
pub use registration::{ProductDetails, Registration, RegistrationWorkflow};
pub use registry::{LedgerRegistry, RegistryStats};
pub use verification::{ProductReport, VerificationWorkflow};

// Re-export commonly used core types
pub use qualitrace_core::{
    verify, Block, BlockRecord, Digest, FailureReason, IntegrityError, Label, ProductRegistration,
    QualityInspection, Record, RecordKind, SubjectId, VerificationQuery, VerificationResult,
};
