//! # weave-registry
//!
//! Tool-inventory registry: discovers what tools each configured MCP server
//! exposes and caches the result per server identity with a freshness TTL.
//!
//! Discovery spawns the server, runs the stdio JSON-RPC handshake, reads the
//! tool listing, and tears the process down. Every server is independent and
//! failure-isolated; a timeout or error leaves that server's inventory absent
//! without touching the others.
//!
//! ## Module Overview
//!
//! - [`descriptor`] — server identity derived from session configuration
//! - [`discovery`] — the stdio transport and handshake protocol
//! - [`registry`] — the TTL cache, bounded-concurrency refresh, and views
//! - [`tags`] — capability tag inference from tool metadata
//! - [`types`] — inventories, outcomes, update results, views
//!
//! ## Crate Position
//!
//! Depends on weave-core. Depended on by weave-engine.

#![deny(unsafe_code)]

pub mod descriptor;
pub mod discovery;
pub mod registry;
pub mod tags;
pub mod types;
