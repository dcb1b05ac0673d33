//! Server connection orchestration
//!
//! Turns the configured server list into per-server connection results,
//! connecting to every server concurrently. Each attempt carries its own
//! timeouts, so one hung server never delays its siblings, and any
//! per-server failure is captured in that server's result instead of
//! aborting the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::Timeouts;
use crate::noise;

use super::config::McpServerConfig;
use super::protocol::ToolInfo;
use super::server::{Connector, ToolServer};

/// Outcome of one connection check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpServerStatus {
    /// Connected, tools listed
    Connected,
    /// Connected but the server advertises nothing; still usable
    NoTools,
    /// Unreachable, unresponsive, or misconfigured
    Failed,
}

impl McpServerStatus {
    /// Usable servers get bound to the agent; failed ones do not.
    pub fn is_usable(self) -> bool {
        matches!(self, McpServerStatus::Connected | McpServerStatus::NoTools)
    }
}

/// Per-server result of one orchestration run. Produced fresh each run;
/// kept only in the in-memory cache.
#[derive(Debug, Clone, Serialize)]
pub struct McpServerInfo {
    pub name: String,
    pub transport: &'static str,
    pub status: McpServerStatus,
    pub tools: Vec<ToolInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl McpServerInfo {
    fn failed(config: &McpServerConfig, error: String) -> Self {
        Self {
            name: config.name.clone(),
            transport: config.transport.kind(),
            status: McpServerStatus::Failed,
            tools: Vec::new(),
            error: Some(error),
            checked_at: Utc::now(),
        }
    }
}

/// Result plus the live handle for usable servers. Ownership of the
/// handle transfers to the caller; the orchestrator only closes handles
/// of servers it rejects.
pub struct ServerConnection {
    pub info: McpServerInfo,
    pub handle: Option<Arc<dyn ToolServer>>,
}

/// Connect to every configured server concurrently. Results come back in
/// input order; an empty config yields an empty list.
pub async fn connect_all(
    connector: Arc<dyn Connector>,
    configs: &[McpServerConfig],
    timeouts: &Timeouts,
) -> Vec<ServerConnection> {
    let tasks: Vec<_> = configs
        .iter()
        .map(|config| {
            let connector = connector.clone();
            let config = config.clone();
            let timeouts = timeouts.clone();
            tokio::spawn(async move { check_server(connector, config, timeouts).await })
        })
        .collect();

    let mut results = Vec::with_capacity(configs.len());
    for (joined, config) in join_all(tasks).await.into_iter().zip(configs) {
        match joined {
            Ok(connection) => results.push(connection),
            Err(e) => {
                error!("Connection task for '{}' panicked: {}", config.name, e);
                results.push(ServerConnection {
                    info: McpServerInfo::failed(config, format!("internal error: {e}")),
                    handle: None,
                });
            }
        }
    }

    let connected: Vec<&str> = results
        .iter()
        .filter(|r| r.info.status.is_usable())
        .map(|r| r.info.name.as_str())
        .collect();
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.info.status == McpServerStatus::Failed)
        .map(|r| r.info.name.as_str())
        .collect();
    if !connected.is_empty() {
        info!("Connected servers ({}): {}", connected.len(), connected.join(", "));
    }
    if !failed.is_empty() {
        warn!("Failed servers ({}): {}", failed.len(), failed.join(", "));
    }

    results
}

/// One server: connect, then list tools, each under its own ceiling.
async fn check_server(
    connector: Arc<dyn Connector>,
    config: McpServerConfig,
    timeouts: Timeouts,
) -> ServerConnection {
    let handle = match timeout(timeouts.connect, connector.connect(&config)).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            error!("MCP server '{}' connection failed: {:#}", config.name, e);
            return ServerConnection {
                info: McpServerInfo::failed(&config, format!("{e:#}")),
                handle: None,
            };
        }
        Err(_) => {
            error!(
                "MCP server '{}' connection timed out ({:?})",
                config.name, timeouts.connect
            );
            return ServerConnection {
                info: McpServerInfo::failed(&config, "connection timeout".to_string()),
                handle: None,
            };
        }
    };

    match timeout(timeouts.list_tools, handle.list_tools()).await {
        Ok(Ok(tools)) => {
            let status = if tools.is_empty() {
                warn!("MCP server '{}' connected but advertises no tools", config.name);
                McpServerStatus::NoTools
            } else {
                info!(
                    "MCP server '{}' ready ({} tools)",
                    config.name,
                    tools.len()
                );
                McpServerStatus::Connected
            };
            ServerConnection {
                info: McpServerInfo {
                    name: config.name.clone(),
                    transport: config.transport.kind(),
                    status,
                    tools,
                    error: None,
                    checked_at: Utc::now(),
                },
                handle: Some(handle),
            }
        }
        Ok(Err(e)) => {
            error!("MCP server '{}' tool listing failed: {:#}", config.name, e);
            close_rejected(&config.name, handle).await;
            ServerConnection {
                info: McpServerInfo::failed(&config, format!("tool listing error: {e:#}")),
                handle: None,
            }
        }
        Err(_) => {
            // Connected but unresponsive is a failure, not a warning.
            error!(
                "MCP server '{}' tool listing timed out ({:?})",
                config.name, timeouts.list_tools
            );
            close_rejected(&config.name, handle).await;
            ServerConnection {
                info: McpServerInfo::failed(&config, "tool listing timeout".to_string()),
                handle: None,
            }
        }
    }
}

/// Close a handle the orchestrator is not handing back to the caller.
async fn close_rejected(name: &str, handle: Arc<dyn ToolServer>) {
    if let Err(e) = handle.close().await {
        noise::log_teardown_error(name, &e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::config::McpTransport;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted per-server behavior for the fake connector
    #[derive(Clone)]
    enum Script {
        Tools(Vec<ToolInfo>),
        NoTools,
        ConnectHangs,
        ConnectFails(&'static str),
        ListHangs,
        ListFails(&'static str),
    }

    /// Shared close/open event log, for ordering assertions
    type EventLog = Arc<Mutex<Vec<String>>>;

    struct FakeServer {
        name: String,
        script: Script,
        events: EventLog,
        closed: Mutex<bool>,
    }

    #[async_trait]
    impl ToolServer for FakeServer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
            if *self.closed.lock().unwrap() {
                return Err(anyhow!("server '{}' connection closed", self.name));
            }
            match &self.script {
                Script::Tools(tools) => Ok(tools.clone()),
                Script::NoTools => Ok(Vec::new()),
                Script::ListHangs => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                Script::ListFails(msg) => Err(anyhow!("{msg}")),
                _ => Ok(Vec::new()),
            }
        }

        async fn call_tool(&self, tool: &str, _args: Value) -> Result<String> {
            Ok(format!("{}::{} ran", self.name, tool))
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            self.events
                .lock()
                .unwrap()
                .push(format!("close:{}", self.name));
            Ok(())
        }
    }

    struct FakeConnector {
        scripts: BTreeMap<String, Script>,
        events: EventLog,
    }

    impl FakeConnector {
        fn new(scripts: Vec<(&str, Script)>) -> (Arc<Self>, EventLog) {
            let events: EventLog = Arc::new(Mutex::new(Vec::new()));
            let connector = Arc::new(Self {
                scripts: scripts
                    .into_iter()
                    .map(|(n, s)| (n.to_string(), s))
                    .collect(),
                events: events.clone(),
            });
            (connector, events)
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, config: &McpServerConfig) -> Result<Arc<dyn ToolServer>> {
            let script = self
                .scripts
                .get(&config.name)
                .cloned()
                .unwrap_or(Script::NoTools);
            match script {
                Script::ConnectHangs => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                Script::ConnectFails(msg) => Err(anyhow!("{msg}")),
                script => {
                    self.events
                        .lock()
                        .unwrap()
                        .push(format!("open:{}", config.name));
                    Ok(Arc::new(FakeServer {
                        name: config.name.clone(),
                        script,
                        events: self.events.clone(),
                        closed: Mutex::new(false),
                    }))
                }
            }
        }
    }

    fn stdio_config(name: &str) -> McpServerConfig {
        McpServerConfig {
            name: name.to_string(),
            transport: McpTransport::Stdio {
                command: "fake".to_string(),
                args: Vec::new(),
            },
        }
    }

    fn short_timeouts() -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(200),
            list_tools: Duration::from_millis(200),
            dispatch: Duration::from_secs(5),
            init: Duration::from_secs(5),
        }
    }

    fn news_tools() -> Vec<ToolInfo> {
        vec![ToolInfo::new(
            "search_news",
            "Search recent news articles by keyword",
        )]
    }

    #[tokio::test]
    async fn test_empty_config_yields_empty_result() {
        let (connector, _) = FakeConnector::new(vec![]);
        let results = connect_all(connector, &[], &short_timeouts()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_hanging_server_does_not_block_siblings() {
        let (connector, _) = FakeConnector::new(vec![
            ("slow", Script::ConnectHangs),
            ("fast", Script::Tools(news_tools())),
        ]);
        let configs = vec![stdio_config("slow"), stdio_config("fast")];

        let started = std::time::Instant::now();
        let results = connect_all(connector, &configs, &short_timeouts()).await;

        // Bounded by the per-server connect timeout, not by head-of-line
        // waiting on the hung server.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].info.status, McpServerStatus::Failed);
        assert_eq!(results[0].info.error.as_deref(), Some("connection timeout"));
        assert_eq!(results[1].info.status, McpServerStatus::Connected);
        assert_eq!(results[1].info.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_good_and_unspawnable() {
        let (connector, _) = FakeConnector::new(vec![
            ("good", Script::Tools(news_tools())),
            ("bad", Script::ConnectFails("command not found: doesnotexist")),
        ]);
        let configs = vec![stdio_config("good"), stdio_config("bad")];

        let results = connect_all(connector, &configs, &short_timeouts()).await;

        assert_eq!(results[0].info.status, McpServerStatus::Connected);
        assert!(results[0].handle.is_some());
        assert_eq!(results[1].info.status, McpServerStatus::Failed);
        assert!(results[1].handle.is_none());
        assert!(results[1].info.error.as_ref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_empty_tool_list_is_usable_degraded() {
        let (connector, _) = FakeConnector::new(vec![("bare", Script::NoTools)]);
        let results =
            connect_all(connector, &[stdio_config("bare")], &short_timeouts()).await;

        assert_eq!(results[0].info.status, McpServerStatus::NoTools);
        assert!(results[0].info.status.is_usable());

        // The live handle is still good for later invocation.
        let handle = results[0].handle.as_ref().unwrap();
        let out = handle
            .call_tool("anything", Value::Null)
            .await
            .unwrap();
        assert_eq!(out, "bare::anything ran");
    }

    #[tokio::test]
    async fn test_listing_timeout_is_failure_and_closes_handle() {
        let (connector, events) = FakeConnector::new(vec![("mute", Script::ListHangs)]);
        let results =
            connect_all(connector, &[stdio_config("mute")], &short_timeouts()).await;

        assert_eq!(results[0].info.status, McpServerStatus::Failed);
        assert_eq!(
            results[0].info.error.as_deref(),
            Some("tool listing timeout")
        );
        assert!(results[0].handle.is_none());
        assert!(events
            .lock()
            .unwrap()
            .contains(&"close:mute".to_string()));
    }

    #[tokio::test]
    async fn test_listing_error_is_failure() {
        let (connector, _) =
            FakeConnector::new(vec![("flaky", Script::ListFails("auth expired"))]);
        let results =
            connect_all(connector, &[stdio_config("flaky")], &short_timeouts()).await;

        assert_eq!(results[0].info.status, McpServerStatus::Failed);
        assert!(results[0]
            .info
            .error
            .as_ref()
            .unwrap()
            .contains("auth expired"));
    }

    #[tokio::test]
    async fn test_initial_tool_list_matches_live_query() {
        let (connector, _) =
            FakeConnector::new(vec![("news", Script::Tools(news_tools()))]);
        let results =
            connect_all(connector, &[stdio_config("news")], &short_timeouts()).await;

        let handle = results[0].handle.as_ref().unwrap();
        let later = handle.list_tools().await.unwrap();
        assert_eq!(later, results[0].info.tools);
    }
}
