//! Hermit core library
//!
//! Everything the chat front ends need but should not implement themselves:
//! MCP server connection orchestration, the agent runtime (one live
//! generation of servers + agent at a time), the background execution loop
//! that synchronous callers submit work to, and the model client.

pub mod agent;
pub mod ai;
pub mod config;
pub mod exec;
pub mod mcp;
pub mod noise;
