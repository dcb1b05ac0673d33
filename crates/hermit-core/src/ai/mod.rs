//! Model client and the shipped agent runner
//!
//! Both configured providers (OpenAI, Ollama) speak the same
//! chat-completions dialect, so one client covers them; only the base URL
//! and credentials differ.

mod client;
mod runner;

pub use client::AiClient;
pub use runner::LlmRunner;
