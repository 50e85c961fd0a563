//! # peoplelint
//!
//! People Curation JSON Linter - Rust Microservice
//!
//! Recovers noisy pasted generator output into JSON, purifies every
//! URL-bearing field, validates the people document invariants, and emits a
//! cleaned document plus a machine-readable report.
//!
//! ## Modules
//!
//! - [`recover`] - Recovery parser for malformed pasted text
//! - [`purify`] - Deterministic URL canonicalization
//! - [`validate`] - Record validation and report assembly
//! - [`export`] - CSV pivot of a cleaned document
//! - [`policy`] - Frozen lint policy (enums, grammars, tracking prefixes)
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust
//! use peoplelint::policy::Policy;
//! use peoplelint::recover::recover;
//! use peoplelint::validate::{validate, RepairMode};
//!
//! fn main() -> anyhow::Result<()> {
//!     let policy = Policy::new()?;
//!     let doc = recover(r#"{"people": [], "people_count": 0}"#, false, &policy)?;
//!     let outcome = validate(doc, &policy, RepairMode::Strict);
//!     println!("status: {}", outcome.report().status);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod export;
pub mod policy;
pub mod purify;
pub mod recover;
pub mod validate;

pub use error::{LintError, Result};
