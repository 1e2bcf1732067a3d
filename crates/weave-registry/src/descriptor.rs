//! Server identity derived from the session's MCP configuration.

use weave_core::request::McpConfig;

/// Identity of one configured tool-providing server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Declared name; falls back to the config map key.
    pub name: String,
    /// Executable spawned for discovery.
    pub command: String,
    /// Arguments for the executable.
    pub args: Vec<String>,
}

impl ServerDescriptor {
    /// Descriptors for every configured server, in name order.
    pub fn from_config(config: &McpConfig) -> Vec<Self> {
        config
            .servers
            .iter()
            .map(|(key, server)| Self {
                name: if server.name.is_empty() {
                    key.clone()
                } else {
                    server.name.clone()
                },
                command: server.command.clone(),
                args: server.args.clone(),
            })
            .collect()
    }

    /// Cache key covering the full identity (name, command, args).
    ///
    /// Args are joined with a unit separator so `["--a", "b"]` and `["--a b"]`
    /// stay distinct.
    pub fn identity_key(&self) -> String {
        format!("{}|{}|{}", self.name, self.command, self.args.join("\u{1f}"))
    }
}
