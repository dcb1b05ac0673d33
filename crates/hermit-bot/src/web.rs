//! Web front end
//!
//! A small synchronous HTTP surface: the chat page, a chat endpoint, and
//! read/write access to the server-list document. Request threads block
//! on the background loop; a config save triggers a full
//! re-initialization before the response goes out.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tiny_http::{Header, Request, Response, Server};
use tracing::{error, info, warn};

use hermit_core::agent::{dispatch_blocking, initialize_blocking, AgentRuntime, AskError};
use hermit_core::exec::BackgroundLoop;
use hermit_core::mcp::McpConfig;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn serve(
    port: u16,
    config_path: PathBuf,
    background: Arc<BackgroundLoop>,
    runtime: Arc<AgentRuntime>,
) -> Result<()> {
    let server =
        Server::http(("0.0.0.0", port)).map_err(|e| anyhow!("failed to bind web server: {e}"))?;
    info!("Web UI listening on http://localhost:{}", port);

    for request in server.incoming_requests() {
        let background = background.clone();
        let runtime = runtime.clone();
        let config_path = config_path.clone();
        std::thread::spawn(move || {
            if let Err(e) = handle(request, &config_path, &background, &runtime) {
                error!("Web request failed: {:#}", e);
            }
        });
    }
    Ok(())
}

fn handle(
    mut request: Request,
    config_path: &Path,
    background: &BackgroundLoop,
    runtime: &Arc<AgentRuntime>,
) -> Result<()> {
    let method = request.method().to_string();
    let path = request.url().split('?').next().unwrap_or("/").to_string();

    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;

    match (method.as_str(), path.as_str()) {
        ("GET", "/") => {
            let response = Response::from_string(INDEX_HTML)
                .with_header(header("Content-Type", "text/html; charset=utf-8"));
            request.respond(response)?;
        }
        ("POST", "/chat") => {
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let message = payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default();

            match dispatch_blocking(background, runtime, message) {
                Ok(answer) => respond_json(request, 200, &json!({"response": answer}))?,
                Err(e) => {
                    respond_json(request, ask_error_status(&e), &json!({"error": e.to_string()}))?
                }
            }
        }
        ("GET", "/api/status") => {
            let rt = runtime.clone();
            let snapshot = background.submit(
                async move { (rt.ready().await, rt.server_reports().await) },
                Duration::from_secs(5),
            );
            match snapshot {
                Ok((ready, reports)) => respond_json(
                    request,
                    200,
                    &json!({"ready": ready, "servers": reports}),
                )?,
                Err(e) => respond_json(request, 500, &json!({"error": e.to_string()}))?,
            }
        }
        ("GET", "/api/config") => match std::fs::read_to_string(config_path) {
            Ok(content) => {
                let value: Value =
                    serde_json::from_str(&content).unwrap_or_else(|_| json!({"mcpServers": {}}));
                respond_json(request, 200, &value)?;
            }
            Err(_) => respond_json(request, 200, &json!({"mcpServers": {}}))?,
        },
        ("POST", "/api/config") => {
            // Validate before persisting; a bad document must not clobber
            // the working one.
            if let Err(e) = McpConfig::parse(&body) {
                respond_json(request, 400, &json!({"error": format!("invalid config: {e:#}")}))?;
                return Ok(());
            }
            let pretty = serde_json::to_string_pretty(
                &serde_json::from_str::<Value>(&body).unwrap_or(Value::Null),
            )?;
            std::fs::write(config_path, pretty)?;
            info!("Server configuration saved, re-initializing");

            match initialize_blocking(background, runtime) {
                Ok(()) => respond_json(request, 200, &json!({"success": true, "ready": true}))?,
                Err(e) => {
                    warn!("Re-initialization after config save failed: {:#}", e);
                    respond_json(
                        request,
                        200,
                        &json!({"success": true, "ready": false, "error": e.to_string()}),
                    )?
                }
            }
        }
        _ => respond_json(request, 404, &json!({"error": "not found"}))?,
    }
    Ok(())
}

/// Distinct status per dispatch failure, per the hardened surface rules.
fn ask_error_status(error: &AskError) -> u32 {
    match error {
        AskError::NotReady => 503,
        AskError::EmptyMessage => 400,
        AskError::Timeout => 504,
        AskError::Execution(_) => 500,
    }
}

fn respond_json(request: Request, status: u32, body: &Value) -> Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header("Content-Type", "application/json"));
    request.respond(response)?;
    Ok(())
}

fn header(name: &str, value: &str) -> Header {
    // Both inputs are static, well-formed strings.
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .unwrap_or_else(|_| unreachable!("static header is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_error_statuses_are_distinct() {
        let statuses = [
            ask_error_status(&AskError::NotReady),
            ask_error_status(&AskError::EmptyMessage),
            ask_error_status(&AskError::Timeout),
            ask_error_status(&AskError::Execution(String::new())),
        ];
        let mut unique = statuses.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), statuses.len());
    }
}
