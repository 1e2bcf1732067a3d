//! # weave-engine
//!
//! The composition pipeline: classify the request, discover the session's
//! tools, select matching guidance modules, render the system prompt, and
//! cache the result.
//!
//! ## Module Overview
//!
//! - [`api`] — JSON string surface for host bindings
//! - [`cache`] — fingerprinted result cache with single-flight computes
//! - [`complexity`] — lexical prompt-complexity heuristic
//! - [`composer`] — deterministic prompt rendering
//! - [`engine`] — shared state: registry, cache, repository snapshots
//! - [`error`] — fatal error taxonomy
//! - [`metrics`] — metric name constants
//! - [`selector`] — trigger evaluation, hints, and module ordering
//!
//! ## Crate Position
//!
//! Top of the workspace: depends on weave-core, weave-modules, and
//! weave-registry.

#![deny(unsafe_code)]

pub mod api;
pub mod cache;
pub mod complexity;
pub mod composer;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod selector;
