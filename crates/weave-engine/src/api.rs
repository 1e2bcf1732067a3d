//! JSON string surface for host bindings.
//!
//! Every function decodes its JSON arguments, delegates to the process-wide
//! [`Engine`](crate::engine::Engine), and encodes the reply, so bindings
//! stay transport-thin.

use std::path::Path;

use serde_json::json;
use weave_core::request::{CompositionRequest, CompositionResponse, McpConfig};
use weave_core::types::CompositionResult;
use weave_modules::scan;

use crate::engine::engine;
use crate::error::EngineError;

/// Compose a system prompt, bypassing the result cache.
pub async fn compose(request_json: &str, prompts_dir: &str) -> Result<String, EngineError> {
    let request = decode_request(request_json)?;
    let result = engine()
        .compose_request(&request, Path::new(prompts_dir), false)
        .await?;
    encode_response(result)
}

/// Compose a system prompt through the fingerprinted result cache.
pub async fn compose_cached(request_json: &str, prompts_dir: &str) -> Result<String, EngineError> {
    let request = decode_request(request_json)?;
    let result = engine()
        .compose_request(&request, Path::new(prompts_dir), true)
        .await?;
    encode_response(result)
}

/// Refresh tool inventories.
///
/// With a config, every listed server is re-discovered regardless of TTL.
/// With `None`, cached inventories older than the TTL are revalidated.
/// Returns `{"refreshed": [...], "failed": {name: reason}}`.
pub async fn refresh_server_tools(mcp_config_json: Option<&str>) -> Result<String, EngineError> {
    let outcome = match mcp_config_json {
        Some(text) => {
            let config: McpConfig =
                serde_json::from_str(text).map_err(|source| EngineError::InvalidRequest { source })?;
            engine().refresh_servers(&config).await
        }
        None => engine().revalidate_servers().await,
    };
    let failed: serde_json::Map<String, serde_json::Value> = outcome
        .failed
        .iter()
        .map(|failure| {
            (
                failure.server.clone(),
                serde_json::Value::String(failure.reason.clone()),
            )
        })
        .collect();
    encode(&json!({
        "refreshed": outcome.refreshed,
        "failed": failed,
    }))
}

/// Module names under `domains/` as a JSON array, extension stripped, sorted.
pub fn list_domains_in_dir(prompts_dir: &str) -> Result<String, EngineError> {
    encode(&scan::list_domains(Path::new(prompts_dir))?)
}

/// Module names under `behaviors/` as a JSON array, extension stripped, sorted.
pub fn list_behaviors_in_dir(prompts_dir: &str) -> Result<String, EngineError> {
    encode(&scan::list_behaviors(Path::new(prompts_dir))?)
}

/// Engine diagnostics as a JSON string.
pub fn get_status() -> Result<String, EngineError> {
    encode(&engine().status())
}

fn decode_request(request_json: &str) -> Result<CompositionRequest, EngineError> {
    serde_json::from_str(request_json).map_err(|source| EngineError::InvalidRequest { source })
}

fn encode_response(result: CompositionResult) -> Result<String, EngineError> {
    encode(&CompositionResponse::from(result))
}

fn encode<T: serde::Serialize>(payload: &T) -> Result<String, EngineError> {
    serde_json::to_string(payload).map_err(|source| EngineError::Encode { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn prompts_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let behaviors = dir.path().join("behaviors");
        let domains = dir.path().join("domains");
        fs::create_dir_all(&behaviors).unwrap();
        fs::create_dir_all(&domains).unwrap();
        fs::write(behaviors.join("concise.md"), "Prefer short answers.\n").unwrap();
        fs::write(
            domains.join("data.md"),
            "---\nkeywords: csv, dataframe\n---\nKeep transformations reproducible.\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn compose_round_trips_json() {
        let prompts = prompts_fixture();
        let reply = compose(
            r#"{"user_prompt": "fix a typo"}"#,
            prompts.path().to_str().unwrap(),
        )
        .await
        .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["system_prompt"], "Prefer short answers.");
        assert_eq!(parsed["complexity"], "low");
        assert_eq!(parsed["cache_hit"], false);
        assert_eq!(parsed["modules_used"][0], "behaviors/concise.md");
    }

    #[tokio::test]
    async fn keyword_prompt_pulls_domain_module() {
        let prompts = prompts_fixture();
        let reply = compose(
            r#"{"user_prompt": "clean this csv export"}"#,
            prompts.path().to_str().unwrap(),
        )
        .await
        .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        let modules: Vec<String> = parsed["modules_used"]
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_str().unwrap().to_string())
            .collect();
        assert_eq!(modules, vec!["behaviors/concise.md", "domains/data.md"]);
    }

    #[tokio::test]
    async fn malformed_request_is_invalid() {
        let err = compose("{not json", "/tmp/anywhere").await.unwrap_err();
        assert_matches!(err, EngineError::InvalidRequest { .. });

        let err = compose(r#"{"session_state": {}}"#, "/tmp/anywhere")
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::InvalidRequest { .. });
    }

    #[tokio::test]
    async fn missing_prompts_dir_is_a_repository_error() {
        let err = compose(r#"{"user_prompt": "x"}"#, "/nonexistent/prompts")
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Repository(_));
    }

    #[tokio::test]
    async fn cached_compose_reports_hit() {
        let prompts = prompts_fixture();
        let dir = prompts.path().to_str().unwrap();
        let request = r#"{"user_prompt": "fix a typo in the readme"}"#;

        let first: serde_json::Value =
            serde_json::from_str(&compose_cached(request, dir).await.unwrap()).unwrap();
        assert_eq!(first["cache_hit"], false);

        let second: serde_json::Value =
            serde_json::from_str(&compose_cached(request, dir).await.unwrap()).unwrap();
        assert_eq!(second["cache_hit"], true);
        assert_eq!(second["system_prompt"], first["system_prompt"]);
    }

    #[test]
    fn listings_report_sorted_names_as_json() {
        let prompts = prompts_fixture();
        let dir = prompts.path().to_str().unwrap();
        assert_eq!(list_behaviors_in_dir(dir).unwrap(), r#"["concise"]"#);
        assert_eq!(list_domains_in_dir(dir).unwrap(), r#"["data"]"#);

        let err = list_domains_in_dir("/nonexistent/prompts").unwrap_err();
        assert_matches!(err, EngineError::Repository(_));
    }

    #[tokio::test]
    async fn refresh_without_config_revalidates() {
        let reply = refresh_server_tools(None).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert!(parsed["refreshed"].is_array());
        assert!(parsed["failed"].is_object());
    }

    #[tokio::test]
    async fn refresh_rejects_malformed_config() {
        let err = refresh_server_tools(Some("[1, 2")).await.unwrap_err();
        assert_matches!(err, EngineError::InvalidRequest { .. });
    }

    #[tokio::test]
    async fn status_is_well_formed() {
        let status: serde_json::Value = serde_json::from_str(&get_status().unwrap()).unwrap();
        assert!(status["version"].is_string());
        assert!(status["cache"]["hitRate"].is_number());
        assert!(status["registry"]["servers"].is_object());
        assert!(status["repositories"].is_object());
    }
}
