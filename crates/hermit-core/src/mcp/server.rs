//! Tool-server boundary
//!
//! Every live server, whatever its transport, is reached through the same
//! three-operation contract: list tools, call a tool, close. Construction
//! plus connect lives behind [`Connector`] so orchestration code (and its
//! tests) never touch transport details.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::config::McpServerConfig;
use super::protocol::ToolInfo;

/// A live, connected tool server
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn name(&self) -> &str;

    /// Query the server's current tool inventory.
    async fn list_tools(&self) -> Result<Vec<ToolInfo>>;

    /// Invoke one tool; the result is rendered to text for the model.
    async fn call_tool(&self, tool: &str, args: Value) -> Result<String>;

    /// Release the underlying resource (subprocess, HTTP session).
    /// Idempotent: closing a closed server is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Builds and connects a transport for one server descriptor.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &McpServerConfig) -> Result<Arc<dyn ToolServer>>;
}
