//! Stdio transport — newline-delimited JSON-RPC 2.0.
//!
//! One request per line on stdin, one response per line on stdout.
//! Requests are handled on spawned tasks so slow backing-API calls never
//! serialize the whole session; a single writer task keeps response lines
//! from interleaving.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::tools::ToolRouter;
use crate::types::Error;

/// Incoming JSON-RPC request or notification.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    /// Absent for notifications.
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Stdio JSON-RPC server wrapping the tool router.
#[derive(Debug)]
pub struct StdioServer {
    router: Arc<ToolRouter>,
    cancel: CancellationToken,
}

impl StdioServer {
    pub fn new(router: Arc<ToolRouter>) -> Self {
        Self {
            router,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the server until stdin closes or shutdown is requested.
    pub async fn serve(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        // Single writer task: responses from concurrent handlers are
        // serialized through this channel.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = out_rx.recv().await {
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.write_all(b"\n").await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
        });

        tracing::info!("stdio server ready");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("stdio server shutting down");
                    break;
                }
                line = lines.next_line() => {
                    let line = match line? {
                        Some(l) => l,
                        None => break, // clean EOF
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let request: RpcRequest = match serde_json::from_str(&line) {
                        Ok(r) => r,
                        Err(e) => {
                            let response = error_response(Value::Null, -32700, &format!("parse error: {}", e));
                            let _ = out_tx.send(response.to_string()).await;
                            continue;
                        }
                    };

                    // Notifications get no response.
                    let Some(id) = request.id.clone() else {
                        tracing::debug!(method = %request.method, "notification_ignored");
                        continue;
                    };

                    let router = self.router.clone();
                    let out_tx = out_tx.clone();
                    tokio::spawn(async move {
                        let response = handle_request(&router, id, &request.method, request.params).await;
                        let _ = out_tx.send(response.to_string()).await;
                    });
                }
            }
        }

        drop(out_tx);
        let _ = writer.await;
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Dispatch one request to a response value.
async fn handle_request(router: &ToolRouter, id: Value, method: &str, params: Value) -> Value {
    match method {
        "initialize" => ok_response(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": {
                    "name": "psa-bridge",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {"tools": {}},
            }),
        ),
        "ping" => ok_response(id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = router
                .catalog()
                .list_entries()
                .into_iter()
                .map(|entry| {
                    json!({
                        "name": entry.name,
                        "description": entry.description,
                        "inputSchema": entry.to_input_schema(),
                    })
                })
                .collect();
            ok_response(id, json!({"tools": tools}))
        }
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let args = params.get("arguments").cloned().unwrap_or(json!({}));
            match router.call(name, args).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|_| result.to_string());
                    ok_response(
                        id,
                        json!({
                            "content": [{"type": "text", "text": text}],
                            "isError": false,
                        }),
                    )
                }
                Err(e) => rpc_error(id, &e),
            }
        }
        other => error_response(id, -32601, &format!("method not found: {}", other)),
    }
}

fn ok_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}

fn rpc_error(id: Value, error: &Error) -> Value {
    error_response(id, error.to_rpc_code(), &error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Entity, EntityKind, QueryFilter, TenantContext};
    use crate::types::{CacheConfig, Result};
    use async_trait::async_trait;

    /// Minimal API double: every query succeeds with nothing in it.
    #[derive(Debug)]
    struct EmptyApi;

    #[async_trait]
    impl crate::api::EntityApi for EmptyApi {
        async fn get_entity(
            &self,
            kind: EntityKind,
            id: i64,
            _tenant: Option<&TenantContext>,
        ) -> Result<Entity> {
            Err(Error::not_found(format!("{} {}", kind, id)))
        }

        async fn query_entities(
            &self,
            _kind: EntityKind,
            _filter: &[QueryFilter],
            _tenant: Option<&TenantContext>,
        ) -> Result<Vec<Entity>> {
            Ok(vec![])
        }
    }

    fn test_router() -> ToolRouter {
        ToolRouter::new(Arc::new(EmptyApi), CacheConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_response_shape() {
        let router = test_router();
        let response = handle_request(&router, json!(1), "initialize", json!({})).await;
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "psa-bridge");
    }

    #[tokio::test]
    async fn test_tools_list_is_sorted_and_schema_bearing() {
        let router = test_router();
        let response = handle_request(&router, json!(2), "tools/list", json!({})).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 10);
        let names: Vec<&str> = tools
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(tools[0]["inputSchema"]["type"] == "object");
    }

    #[tokio::test]
    async fn test_unknown_method_yields_rpc_error() {
        let router = test_router();
        let response = handle_request(&router, json!(3), "bogus/method", json!({})).await;
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_tool_call_with_bad_args_yields_invalid_params() {
        let router = test_router();
        let params = json!({"name": "get_company", "arguments": {}});
        let response = handle_request(&router, json!(4), "tools/call", params).await;
        assert_eq!(response["error"]["code"], -32602);
        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_tool_call_success_wraps_content() {
        let router = test_router();
        let params = json!({"name": "search_companies", "arguments": {"search": "Acme"}});
        let response = handle_request(&router, json!(5), "tools/call", params).await;
        assert_eq!(response["result"]["isError"], false);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"count\": 0"));
        router.shutdown().await;
    }
}
