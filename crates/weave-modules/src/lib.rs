//! # weave-modules
//!
//! Module repository: loads guidance modules (markdown files with a fenced
//! metadata header) from a prompts directory into immutable, content-hashed
//! snapshots.
//!
//! ## Module Overview
//!
//! - [`header`] — fenced header parsing (priority + trigger clauses)
//! - [`predicate`] — boolean expression trees and the evaluation context
//! - [`scan`] — directory scanning, snapshot construction, listings
//! - [`types`] — module, snapshot, and scan-result types
//!
//! ## Crate Position
//!
//! Depends on weave-core. Depended on by weave-engine.

#![deny(unsafe_code)]

pub mod header;
pub mod predicate;
pub mod scan;
pub mod types;
