//! Core value types shared across the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Task complexity tier classified from the user prompt.
///
/// The derive order gives `Low < Medium < High`, which module predicates rely
/// on for minimum-tier gates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    /// Short, single-step requests.
    #[default]
    Low,
    /// Requests with some structural signal.
    Medium,
    /// Multi-step or large-scope requests.
    High,
}

impl ComplexityTier {
    /// Parse a tier name as it appears in module headers.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Stable lowercase name (wire form).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which subtree of the prompts directory a module came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Reasoning/interaction guidance (`behaviors/`). Renders before domains.
    Behavior,
    /// Subject-area guidance (`domains/`).
    Domain,
}

impl ModuleKind {
    /// Subtree name under the prompts directory.
    pub fn subtree(self) -> &'static str {
        match self {
            Self::Behavior => "behaviors",
            Self::Domain => "domains",
        }
    }

    /// Composition order rank: behaviors render before domains.
    pub fn rank(self) -> u8 {
        match self {
            Self::Behavior => 0,
            Self::Domain => 1,
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Behavior => write!(f, "behavior"),
            Self::Domain => write!(f, "domain"),
        }
    }
}

/// Opaque session state forwarded to trigger predicates.
///
/// Keys are host-defined (`tool_call_count`, `has_plan`, …); the engine never
/// mutates or interprets fields beyond predicate evaluation. Backed by a
/// sorted map so its serialization is canonical and safe to fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(pub BTreeMap<String, serde_json::Value>);

impl SessionState {
    /// Look up a field referenced by a predicate.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    /// Set a field (builder convenience for hosts and tests).
    pub fn insert(&mut self, field: impl Into<String>, value: serde_json::Value) {
        let _ = self.0.insert(field.into(), value);
    }

    /// True when the host passed no state.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Final output of one composition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionResult {
    /// Rendered system prompt text.
    pub system_prompt: String,
    /// Identities (paths relative to the prompts directory) of the modules
    /// merged, in render order.
    pub modules_used: Vec<String>,
    /// Tier the request was classified into (or overridden with).
    pub complexity: ComplexityTier,
    /// True when served from the result cache without recomputation.
    pub cache_hit: bool,
}
