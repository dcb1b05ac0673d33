//! Process configuration
//!
//! Settings come from the environment (the deployment story is a `.env`
//! exported by the service manager); the MCP server list lives in its own
//! JSON document, see [`crate::mcp::config`].

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors are fatal to the operation that needed the value,
/// never to the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported LLM provider '{0}' (expected 'openai' or 'ollama')")]
    UnknownProvider(String),

    #[error("LLM_PROVIDER=openai requires OPENAI_API_KEY to be set")]
    MissingApiKey,
}

/// Which chat-completions backend the agent talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// Resolved model endpoint: provider, base URL, model id, credentials
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Process-wide settings loaded from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram_token: Option<String>,
    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub model_name: String,
}

impl Settings {
    /// Read settings from the environment. Does not validate the model
    /// configuration; that happens when an agent is actually built, so a
    /// misconfigured model breaks initialization, not startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_provider = match env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => LlmProvider::OpenAi,
            "ollama" => LlmProvider::Ollama,
            other => return Err(ConfigError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            telegram_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            llm_provider,
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/v1".to_string()),
            ollama_model: env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| "qwen2.5:7b".to_string()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }

    /// Resolve the model endpoint for the configured provider.
    pub fn model_spec(&self) -> Result<ModelSpec, ConfigError> {
        match self.llm_provider {
            LlmProvider::OpenAi => {
                let api_key = self
                    .openai_api_key
                    .clone()
                    .ok_or(ConfigError::MissingApiKey)?;
                Ok(ModelSpec {
                    provider: LlmProvider::OpenAi,
                    base_url: self.openai_base_url.clone(),
                    model: self.model_name.clone(),
                    api_key: Some(api_key),
                })
            }
            LlmProvider::Ollama => Ok(ModelSpec {
                provider: LlmProvider::Ollama,
                base_url: self.ollama_base_url.clone(),
                // Ollama ignores MODEL_NAME; the pulled model id is its own setting
                model: self.ollama_model.clone(),
                api_key: None,
            }),
        }
    }

}

/// Every blocking wait in the system carries one of these ceilings.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Per-server connection attempt
    pub connect: Duration,
    /// Tool listing on an already-connected server
    pub list_tools: Duration,
    /// One full agent invocation, submitted from a serving thread
    pub dispatch: Duration,
    /// Full teardown + reconnect + agent rebuild
    pub init: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            list_tools: Duration::from_secs(10),
            dispatch: Duration::from_secs(180),
            init: Duration::from_secs(120),
        }
    }
}

impl Timeouts {
    /// Defaults, with optional per-knob overrides from the environment
    /// (`HERMIT_CONNECT_TIMEOUT_SECS` etc). Unparseable values fall back.
    pub fn from_env() -> Self {
        fn secs(var: &str, default: Duration) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        }

        let d = Self::default();
        Self {
            connect: secs("HERMIT_CONNECT_TIMEOUT_SECS", d.connect),
            list_tools: secs("HERMIT_LIST_TOOLS_TIMEOUT_SECS", d.list_tools),
            dispatch: secs("HERMIT_DISPATCH_TIMEOUT_SECS", d.dispatch),
            init: secs("HERMIT_INIT_TIMEOUT_SECS", d.init),
        }
    }
}
