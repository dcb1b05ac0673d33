//! Agent definition and runtime
//!
//! An agent is a model endpoint plus instructions plus the usable tool
//! servers of the current generation. The runtime owns exactly one live
//! generation at a time and is the only writer of that state.

mod prompts;
mod runner;
mod runtime;

use std::sync::Arc;

use thiserror::Error;

use crate::config::ModelSpec;
use crate::mcp::{ToolInfo, ToolServer};

pub use prompts::load_instructions;
pub use runner::AgentRunner;
pub use runtime::{dispatch_blocking, initialize_blocking, AgentRuntime, RuntimePaths};

/// A tool server bound to the agent, with the tool inventory captured at
/// bind time (what the model gets advertised).
#[derive(Clone)]
pub struct BoundServer {
    pub name: String,
    pub handle: Arc<dyn ToolServer>,
    pub tools: Vec<ToolInfo>,
}

/// One reasoning unit: model + instructions + bound tool servers.
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: ModelSpec,
    pub servers: Vec<BoundServer>,
}

/// Typed failures of one dispatch, in precondition order. The rendered
/// messages are what chat surfaces show; full diagnostic detail only goes
/// to the log.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("the agent is not ready yet")]
    NotReady,

    #[error("message is empty")]
    EmptyMessage,

    #[error("the request timed out")]
    Timeout,

    #[error("processing failed")]
    Execution(String),
}
