//! Agent runtime: one live generation at a time
//!
//! The runtime is the single owner of the process-wide agent/server state.
//! Initialization tears the previous generation down completely before
//! standing up the next, and replaces the state wholesale, so readers see
//! either the fully-old or the fully-new generation, never a mix. All
//! mutation happens on the background loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::{Settings, Timeouts};
use crate::exec::{BackgroundLoop, SubmitError};
use crate::mcp::{connect_all, Connector, McpConfig, McpServerInfo};
use crate::noise;

use super::{load_instructions, Agent, AgentRunner, AskError, BoundServer};

/// Files the runtime reads on every (re)initialization.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Server-list document (`mcp_config.json`)
    pub servers: PathBuf,
    /// Agent instructions (`prompts/agent.txt`)
    pub prompt: PathBuf,
}

/// One complete set of live handles + agent.
struct Generation {
    agent: Agent,
}

impl Generation {
    /// Close every handle. Expected teardown noise goes to debug.
    async fn shutdown(self) {
        for server in &self.agent.servers {
            if let Err(e) = server.handle.close().await {
                noise::log_teardown_error(&server.name, &e);
            }
        }
    }
}

/// Owner of the live agent state.
pub struct AgentRuntime {
    connector: Arc<dyn Connector>,
    runner: Arc<dyn AgentRunner>,
    settings: Settings,
    timeouts: Timeouts,
    paths: RuntimePaths,
    state: RwLock<Option<Generation>>,
    last_reports: RwLock<Vec<McpServerInfo>>,
}

impl AgentRuntime {
    pub fn new(
        connector: Arc<dyn Connector>,
        runner: Arc<dyn AgentRunner>,
        settings: Settings,
        timeouts: Timeouts,
        paths: RuntimePaths,
    ) -> Self {
        Self {
            connector,
            runner,
            settings,
            timeouts,
            paths,
            state: RwLock::new(None),
            last_reports: RwLock::new(Vec::new()),
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Whether a live generation exists.
    pub async fn ready(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Per-server results of the last orchestration run.
    pub async fn server_reports(&self) -> Vec<McpServerInfo> {
        self.last_reports.read().await.clone()
    }

    /// Tear down the previous generation (if any), reconnect every
    /// configured server, and build a fresh agent over the usable set.
    /// Zero usable servers still yields a ready, model-only agent; a
    /// failed agent build leaves the runtime not ready.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(previous) = self.state.write().await.take() {
            info!("Shutting down previous server generation");
            previous.shutdown().await;
        }

        let config = McpConfig::load(&self.paths.servers)
            .context("failed to load server configuration")?;
        let connections = connect_all(self.connector.clone(), &config.servers, &self.timeouts).await;

        let mut reports = Vec::with_capacity(connections.len());
        let mut servers = Vec::new();
        for connection in connections {
            if let Some(handle) = connection.handle {
                servers.push(BoundServer {
                    name: connection.info.name.clone(),
                    handle,
                    tools: connection.info.tools.clone(),
                });
            }
            reports.push(connection.info);
        }
        *self.last_reports.write().await = reports;

        let model = match self.settings.model_spec() {
            Ok(model) => model,
            Err(e) => {
                // No agent to own these handles; close them before bailing.
                error!("Agent construction failed: {}", e);
                for server in &servers {
                    if let Err(close_err) = server.handle.close().await {
                        noise::log_teardown_error(&server.name, &close_err);
                    }
                }
                return Err(anyhow!(e).context("agent construction failed"));
            }
        };

        let agent = Agent {
            name: "Hermit".to_string(),
            instructions: load_instructions(&self.paths.prompt),
            model,
            servers,
        };

        info!(
            "Agent ready: model={}, tool servers={}",
            agent.model.model,
            agent.servers.len()
        );
        *self.state.write().await = Some(Generation { agent });
        Ok(())
    }

    /// Run one user message against the live agent.
    pub async fn ask(&self, input: &str) -> Result<String, AskError> {
        let agent = {
            let state = self.state.read().await;
            let generation = state.as_ref().ok_or(AskError::NotReady)?;
            generation.agent.clone()
        };

        if input.trim().is_empty() {
            return Err(AskError::EmptyMessage);
        }

        match self.runner.run(&agent, input).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                error!("Agent execution failed: {:#}", e);
                Err(AskError::Execution(format!("{e:#}")))
            }
        }
    }
}

/// Submit one message from a synchronous serving thread and block until
/// the answer arrives or the dispatch ceiling expires.
pub fn dispatch_blocking(
    background: &BackgroundLoop,
    runtime: &Arc<AgentRuntime>,
    input: &str,
) -> Result<String, AskError> {
    let rt = runtime.clone();
    let input = input.to_string();
    match background.submit(async move { rt.ask(&input).await }, runtime.timeouts.dispatch) {
        Ok(result) => result,
        Err(SubmitError::Timeout) => Err(AskError::Timeout),
        Err(SubmitError::Closed) => Err(AskError::Execution("background loop closed".to_string())),
    }
}

/// Run a full (re)initialization from a synchronous serving thread.
pub fn initialize_blocking(
    background: &BackgroundLoop,
    runtime: &Arc<AgentRuntime>,
) -> Result<()> {
    let rt = runtime.clone();
    match background.submit(async move { rt.initialize().await }, runtime.timeouts.init) {
        Ok(result) => result,
        Err(e) => Err(anyhow!("initialization did not finish: {e}")),
    }
}
