//! # Qualitrace Testkit
//!
//! Testing utilities for Qualitrace.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known blocks with expected encodings and hashes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A registry on a manual clock, a scripted oracle and a
//!   store that corrupts what it reads back
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding across implementations:
//!
//! ```rust
//! use qualitrace_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, _bytes, hash) in verify_all_vectors() {
//!     println!("{}: {} ({})", name, hash, matches);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use qualitrace_testkit::generators::{chain_from_params, ChainParams};
//!
//! proptest! {
//!     #[test]
//!     fn generated_chains_verify(params: ChainParams) {
//!         prop_assert!(qualitrace::verify(&chain_from_params(&params)).ok);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use qualitrace_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! fixture.register("P1");
//! fixture.advance(60_000);
//! fixture.inspect("P1", "I1", 92);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    multi_product_fixtures, product_chain, CorruptingStore, ScriptedOracle, Tamper, TestFixture,
};
pub use generators::{chain_from_params, ChainParams};
pub use vectors::{all_vectors, reference_chain, verify_all_vectors, GoldenVector, T0};
