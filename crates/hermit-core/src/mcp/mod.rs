//! MCP (Model Context Protocol) client orchestration
//!
//! Two kinds of servers are supported:
//! - Stdio: we spawn the process and speak MCP over its pipes
//! - HTTP: streamable-HTTP endpoint, optionally with auth headers
//!
//! The protocol itself comes from the `rmcp` crate; this module owns the
//! connection orchestration around it: concurrent per-server connect and
//! tool discovery, independent timeouts, and partial-failure tolerance.

mod client;
pub mod config;
mod manager;
mod protocol;
mod server;

pub use client::RmcpConnector;
pub use config::{McpConfig, McpServerConfig, McpTransport};
pub use manager::{connect_all, McpServerInfo, McpServerStatus, ServerConnection};
pub use protocol::ToolInfo;
pub use server::{Connector, ToolServer};
