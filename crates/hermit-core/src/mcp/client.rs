//! rmcp-backed tool servers
//!
//! Production [`Connector`]: stdio servers are spawned as child processes
//! with the working directory pinned to the project root (so relative
//! script paths resolve the same no matter who launched us) and the
//! parent's environment inherited; HTTP servers get a streamable-HTTP
//! session with any configured headers applied to every request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService},
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, ConfigureCommandExt,
        StreamableHttpClientTransport, TokioChildProcess,
    },
    ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::config::{McpServerConfig, McpTransport};
use super::protocol::ToolInfo;
use super::server::{Connector, ToolServer};

/// A connected rmcp session. `close()` consumes the underlying service,
/// so it lives in an Option behind a lock.
pub struct McpClient {
    name: String,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl McpClient {
    fn new(name: String, service: RunningService<RoleClient, ()>) -> Self {
        Self {
            name,
            service: Mutex::new(Some(service)),
        }
    }
}

#[async_trait]
impl ToolServer for McpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let guard = self.service.lock().await;
        let service = guard
            .as_ref()
            .with_context(|| format!("server '{}' connection closed", self.name))?;

        let tools = service
            .list_all_tools()
            .await
            .with_context(|| format!("tool listing on '{}' failed", self.name))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolInfo {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or("").to_string(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<String> {
        let guard = self.service.lock().await;
        let service = guard
            .as_ref()
            .with_context(|| format!("server '{}' connection closed", self.name))?;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => Some(
                serde_json::Map::from_iter([("value".to_string(), other)]),
            ),
        };

        let result = service
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments,
            })
            .await
            .with_context(|| format!("tool '{}' on '{}' failed", tool, self.name))?;

        let rendered = render_tool_result(&result);
        if result.is_error.unwrap_or(false) {
            return Err(anyhow!("{rendered}"));
        }
        Ok(rendered)
    }

    async fn close(&self) -> Result<()> {
        let service = self.service.lock().await.take();
        if let Some(service) = service {
            debug!("Closing MCP session '{}'", self.name);
            service
                .cancel()
                .await
                .map_err(|e| anyhow!("closing '{}': {}", self.name, e))?;
        }
        Ok(())
    }
}

/// Flatten a tool result's text blocks; fall back to raw JSON for
/// non-text content.
fn render_tool_result(result: &rmcp::model::CallToolResult) -> String {
    let value = serde_json::to_value(result).unwrap_or(Value::Null);
    let mut parts = Vec::new();
    if let Some(content) = value.get("content").and_then(|c| c.as_array()) {
        for block in content {
            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                parts.push(text.to_string());
            }
        }
    }
    if parts.is_empty() {
        value.to_string()
    } else {
        parts.join("\n")
    }
}

/// Production connector building rmcp transports
pub struct RmcpConnector {
    project_root: PathBuf,
}

impl RmcpConnector {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    async fn connect_stdio(
        &self,
        name: &str,
        command: &str,
        args: &[String],
    ) -> Result<RunningService<RoleClient, ()>> {
        // Resolve up front so a missing binary fails with a clear message
        // instead of a spawn error from deep inside the transport.
        let resolved =
            which::which(command).map_err(|_| anyhow!("command not found: {command}"))?;

        info!(
            "Connecting to MCP stdio server: name={}, command={}",
            name, command
        );

        let transport = TokioChildProcess::new(
            tokio::process::Command::new(resolved).configure(|cmd| {
                cmd.args(args)
                    .current_dir(&self.project_root)
                    .stderr(std::process::Stdio::inherit());
            }),
        )
        .with_context(|| format!("failed to spawn '{command}'"))?;

        ().serve(transport)
            .await
            .with_context(|| format!("MCP handshake with '{name}' failed"))
    }

    async fn connect_http(
        &self,
        name: &str,
        url: &str,
        headers: &std::collections::BTreeMap<String, String>,
    ) -> Result<RunningService<RoleClient, ()>> {
        url::Url::parse(url).with_context(|| format!("invalid server url '{url}'"))?;

        info!("Connecting to MCP HTTP server: name={}, url={}", name, url);

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid header name '{key}'"))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header '{key}'"))?;
            header_map.insert(header_name, header_value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(header_map)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        let transport = StreamableHttpClientTransport::with_client(
            http_client,
            StreamableHttpClientTransportConfig::with_uri(url.to_string()),
        );

        ().serve(transport)
            .await
            .with_context(|| format!("MCP handshake with '{name}' failed"))
    }
}

#[async_trait]
impl Connector for RmcpConnector {
    async fn connect(&self, config: &McpServerConfig) -> Result<Arc<dyn ToolServer>> {
        let service = match &config.transport {
            McpTransport::Stdio { command, args } => {
                self.connect_stdio(&config.name, command, args).await?
            }
            McpTransport::Http { url, headers } => {
                self.connect_http(&config.name, url, headers).await?
            }
        };

        Ok(Arc::new(McpClient::new(config.name.clone(), service)))
    }
}
