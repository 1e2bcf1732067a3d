//! # weave-core
//!
//! Shared vocabulary for the Weave prompt-composition engine.
//!
//! - **Complexity tiers**: [`types::ComplexityTier`], ordered `Low < Medium < High`
//! - **Module kinds**: [`types::ModuleKind`] — behavior vs domain guidance
//! - **Session state**: [`types::SessionState`], the open JSON bag predicates read
//! - **Requests**: [`request::CompositionRequest`] and the `mcpServers` config map
//! - **Results**: [`types::CompositionResult`] with the rendered prompt
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by weave-modules, weave-registry, and
//! weave-engine.

#![deny(unsafe_code)]

pub mod request;
pub mod types;
