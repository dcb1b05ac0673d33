//! The shipped agent runner: chat-completions with a bounded tool loop
//!
//! MCP tools are advertised to the model under `mcp__{server}_{tool}`
//! names so a call can be routed back to the owning live server. Tool
//! failures are fed to the model as tool output rather than aborting the
//! run; the model decides how to recover.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agent::{Agent, AgentRunner, BoundServer};

use super::client::{extract_text, AiClient};

/// A model that keeps calling tools past this is going in circles.
const MAX_TOOL_ROUNDS: usize = 8;

pub struct LlmRunner {
    http: reqwest::Client,
}

impl LlmRunner {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for LlmRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRunner for LlmRunner {
    async fn run(&self, agent: &Agent, input: &str) -> Result<String> {
        let client = AiClient::new(self.http.clone(), agent.model.clone());
        let tools = advertise_tools(agent);

        let mut messages = vec![
            json!({"role": "system", "content": agent.instructions}),
            json!({"role": "user", "content": input}),
        ];

        for round in 0..MAX_TOOL_ROUNDS {
            let message = client.chat(&messages, &tools).await?;

            let calls = message
                .get("tool_calls")
                .and_then(|c| c.as_array())
                .cloned()
                .unwrap_or_default();
            if calls.is_empty() {
                return extract_text(&message)
                    .ok_or_else(|| anyhow!("model returned an empty answer"));
            }

            debug!("Round {}: {} tool call(s)", round + 1, calls.len());
            messages.push(message.clone());
            for call in &calls {
                messages.push(execute_tool_call(agent, call).await);
            }
        }

        bail!("tool loop did not converge after {MAX_TOOL_ROUNDS} rounds")
    }
}

/// Run one tool call and wrap the output as a tool message.
async fn execute_tool_call(agent: &Agent, call: &Value) -> Value {
    let id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default();
    let full_name = call
        .pointer("/function/name")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let args = call
        .pointer("/function/arguments")
        .and_then(|v| v.as_str())
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!({}));

    let output = match resolve_tool(agent, full_name) {
        Some((server, tool)) => match server.handle.call_tool(tool, args).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Tool '{}' failed: {:#}", full_name, e);
                format!("MCP error: {e:#}")
            }
        },
        None => {
            warn!("Model asked for unknown tool '{}'", full_name);
            format!("unknown tool: {full_name}")
        }
    };

    json!({"role": "tool", "tool_call_id": id, "content": output})
}

/// Tool definitions in the shape the chat-completions API expects.
fn advertise_tools(agent: &Agent) -> Vec<Value> {
    let mut defs = Vec::new();
    for server in &agent.servers {
        for tool in &server.tools {
            defs.push(json!({
                "type": "function",
                "function": {
                    "name": full_tool_name(&server.name, &tool.name),
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            }));
        }
    }
    defs
}

fn full_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{server}_{tool}")
}

/// Map an advertised name back to the owning server and its local tool name.
fn resolve_tool<'a>(agent: &'a Agent, full_name: &'a str) -> Option<(&'a BoundServer, &'a str)> {
    for server in &agent.servers {
        let prefix = format!("mcp__{}_", server.name);
        if let Some(tool) = full_name.strip_prefix(prefix.as_str()) {
            if !tool.is_empty() {
                return Some((server, tool));
            }
        }
    }
    None
}
