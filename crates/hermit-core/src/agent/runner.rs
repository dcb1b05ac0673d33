//! Agent invocation boundary
//!
//! The runtime hands a runner an agent and one user message and expects a
//! final textual answer back. How the runner gets there (which API, how
//! many tool rounds) is its own business; any conforming implementation
//! slots in. The shipped one is [`crate::ai::LlmRunner`].

use anyhow::Result;
use async_trait::async_trait;

use super::Agent;

#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, agent: &Agent, input: &str) -> Result<String>;
}
