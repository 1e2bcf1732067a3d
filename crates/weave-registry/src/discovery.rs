//! Discovery handshake over stdio JSON-RPC.
//!
//! The exchange is newline-delimited: `initialize` (id 1), the
//! `notifications/initialized` notification, then `tools/list` (id 2), after
//! which the child is killed. Callers bound the whole handshake with a
//! deadline; a future dropped at the deadline reaps the child via
//! kill-on-drop.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::debug;

use crate::descriptor::ServerDescriptor;
use crate::types::ToolDescriptor;

/// Protocol revision sent in `initialize`.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Why a discovery handshake failed.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The server process could not be spawned.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        /// The executable that failed to start.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The server closed its stream before answering.
    #[error("server closed the stream before responding")]
    ClosedStream,
    /// The server broke the framing or response shape.
    #[error("protocol error: {message}")]
    Protocol {
        /// What was malformed.
        message: String,
    },
    /// The server answered with a JSON-RPC error object.
    #[error("server error: {message}")]
    Rpc {
        /// The server-reported error message.
        message: String,
    },
    /// Pipe I/O failed mid-handshake.
    #[error("i/o error during handshake: {source}")]
    Io {
        /// Underlying OS error.
        #[from]
        source: std::io::Error,
    },
}

/// Transport that lists a server's tools.
///
/// The registry depends on this seam so tests can stand in fake servers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Run the discovery handshake and return the reported tools.
    async fn list_tools(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<Vec<ToolDescriptor>, DiscoveryError>;
}

/// Stdio transport: spawns the configured command once per handshake.
#[derive(Debug, Default)]
pub struct StdioTransport;

#[async_trait]
impl McpTransport for StdioTransport {
    async fn list_tools(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        let mut child = spawn_server(descriptor)?;
        let result = handshake(&mut child).await;
        let _ = child.kill().await;
        result
    }
}

fn spawn_server(descriptor: &ServerDescriptor) -> Result<Child, DiscoveryError> {
    let mut command = tokio::process::Command::new(&descriptor.command);
    let _ = command
        .args(&descriptor.args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    debug!(server = %descriptor.name, command = %descriptor.command, "spawning server for discovery");

    command.spawn().map_err(|e| DiscoveryError::Spawn {
        command: descriptor.command.clone(),
        source: e,
    })
}

async fn handshake(child: &mut Child) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
    let mut stdin = child.stdin.take().ok_or_else(|| DiscoveryError::Protocol {
        message: "child stdin unavailable".into(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| DiscoveryError::Protocol {
        message: "child stdout unavailable".into(),
    })?;
    let mut lines = BufReader::new(stdout).lines();

    let initialize = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "weave",
                "version": env!("CARGO_PKG_VERSION"),
            },
        },
    });
    send_line(&mut stdin, &initialize).await?;
    let _ = read_response(&mut lines, 1).await?;

    send_line(
        &mut stdin,
        &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await?;

    send_line(
        &mut stdin,
        &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}}),
    )
    .await?;
    let listing = read_response(&mut lines, 2).await?;

    let result: ToolsListResult =
        serde_json::from_value(listing).map_err(|e| DiscoveryError::Protocol {
            message: format!("malformed tools/list result: {e}"),
        })?;
    Ok(result.tools)
}

async fn send_line(stdin: &mut ChildStdin, message: &Value) -> Result<(), DiscoveryError> {
    let mut line = serde_json::to_string(message).map_err(|e| DiscoveryError::Protocol {
        message: format!("failed to encode request: {e}"),
    })?;
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

/// Read lines until the response matching `id`; returns its `result`.
///
/// Server-initiated requests and notifications are skipped.
async fn read_response(
    lines: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<Value, DiscoveryError> {
    loop {
        let line = lines
            .next_line()
            .await?
            .ok_or(DiscoveryError::ClosedStream)?;
        if line.trim().is_empty() {
            continue;
        }
        let message: RpcMessage =
            serde_json::from_str(&line).map_err(|e| DiscoveryError::Protocol {
                message: format!("unparsable server output: {e}"),
            })?;
        if message.method.is_some() || message.id != Some(id) {
            continue;
        }
        if let Some(error) = message.error {
            return Err(DiscoveryError::Rpc {
                message: error.message,
            });
        }
        return message.result.ok_or_else(|| DiscoveryError::Protocol {
            message: format!("response {id} carried neither result nor error"),
        });
    }
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const INIT_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"stub","version":"0.1.0"}}}"#;

    fn stub_server(script: &str) -> ServerDescriptor {
        ServerDescriptor {
            name: "stub".into(),
            command: "sh".into(),
            args: vec!["-c".into(), script.to_string()],
        }
    }

    fn scripted(init_response: &str, list_response: &str) -> String {
        format!(
            "read -r _\nprintf '%s\\n' '{init_response}'\nread -r _\nread -r _\nprintf '%s\\n' '{list_response}'\n"
        )
    }

    #[tokio::test]
    async fn test_handshake_lists_tools() {
        let script = scripted(
            INIT_RESPONSE,
            r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"read_file","description":"Read a file from disk"},{"name":"write_file","description":"Write a file to disk"}]}}"#,
        );
        let tools = StdioTransport
            .list_tools(&stub_server(&script))
            .await
            .unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "write_file"]);
        assert_eq!(tools[0].description, "Read a file from disk");
    }

    #[tokio::test]
    async fn test_missing_tools_key_is_empty_inventory() {
        let script = scripted(INIT_RESPONSE, r#"{"jsonrpc":"2.0","id":2,"result":{}}"#);
        let tools = StdioTransport
            .list_tools(&stub_server(&script))
            .await
            .unwrap();
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_notifications_are_skipped() {
        let script = format!(
            "read -r _\nprintf '%s\\n' '{}'\nprintf '%s\\n' '{}'\nread -r _\nread -r _\nprintf '%s\\n' '{}'\n",
            r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#,
            INIT_RESPONSE,
            r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"ping"}]}}"#,
        );
        let tools = StdioTransport
            .list_tools(&stub_server(&script))
            .await
            .unwrap();
        assert_eq!(tools[0].name, "ping");
        assert_eq!(tools[0].description, "");
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let script = scripted(
            INIT_RESPONSE,
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"tools not supported"}}"#,
        );
        let err = StdioTransport
            .list_tools(&stub_server(&script))
            .await
            .unwrap_err();
        assert_matches!(err, DiscoveryError::Rpc { message } if message == "tools not supported");
    }

    #[tokio::test]
    async fn test_garbage_output_is_protocol_error() {
        let script = "read -r _\nprintf '%s\\n' 'not json at all'\n";
        let err = StdioTransport
            .list_tools(&stub_server(script))
            .await
            .unwrap_err();
        assert_matches!(err, DiscoveryError::Protocol { .. });
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let descriptor = ServerDescriptor {
            name: "ghost".into(),
            command: "/nonexistent/weave-test-server".into(),
            args: Vec::new(),
        };
        let err = StdioTransport.list_tools(&descriptor).await.unwrap_err();
        assert_matches!(err, DiscoveryError::Spawn { .. });
    }

    #[tokio::test]
    async fn test_immediate_exit_fails_handshake() {
        let err = StdioTransport
            .list_tools(&stub_server("exit 0"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::ClosedStream | DiscoveryError::Io { .. }
        ));
    }
}
