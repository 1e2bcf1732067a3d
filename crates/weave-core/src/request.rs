//! Composition request/response wire types.
//!
//! Field names match the JSON surface exactly: `user_prompt`,
//! `mcp_config.mcpServers`, `session_state`. Everything except `user_prompt`
//! defaults, so a minimal request is `{"user_prompt": "..."}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ComplexityTier, CompositionResult, SessionState};

/// Launch spec for a single MCP server from the session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Declared server name. When empty, the map key stands in.
    #[serde(default)]
    pub name: String,
    /// Executable to spawn for discovery.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

/// MCP configuration: server name → launch spec.
///
/// A sorted map keeps descriptor order and request fingerprints stable
/// regardless of host-side key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Configured servers, keyed by name.
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, McpServerConfig>,
}

impl McpConfig {
    /// True when the session configures no servers.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// One composition request as received on the JSON surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionRequest {
    /// The user's request text, the main selection signal.
    pub user_prompt: String,
    /// Tool-providing servers configured for the session.
    #[serde(default)]
    pub mcp_config: McpConfig,
    /// Opaque host state read by module predicates.
    #[serde(default)]
    pub session_state: SessionState,
    /// Domain modules (names under `domains/`, no extension) to include
    /// regardless of trigger outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_hints: Vec<String>,
    /// Behavior modules to include regardless of trigger outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behavior_hints: Vec<String>,
    /// Overrides the complexity heuristic when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_complexity: Option<ComplexityTier>,
}

/// Composition response as emitted on the JSON surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionResponse {
    /// Rendered system prompt.
    pub system_prompt: String,
    /// Module identities merged into the prompt, in render order.
    pub modules_used: Vec<String>,
    /// Tier the request was classified into.
    pub complexity: ComplexityTier,
    /// Whether the result was served from the composition cache.
    #[serde(default)]
    pub cache_hit: bool,
}

impl From<CompositionResult> for CompositionResponse {
    fn from(result: CompositionResult) -> Self {
        Self {
            system_prompt: result.system_prompt,
            modules_used: result.modules_used,
            complexity: result.complexity,
            cache_hit: result.cache_hit,
        }
    }
}
