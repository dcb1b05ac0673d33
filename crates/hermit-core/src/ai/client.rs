//! OpenAI-compatible chat-completions client

use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::debug;

use crate::config::ModelSpec;

/// Thin wrapper over one chat-completions endpoint.
pub struct AiClient {
    http: reqwest::Client,
    spec: ModelSpec,
}

impl AiClient {
    pub fn new(http: reqwest::Client, spec: ModelSpec) -> Self {
        Self { http, spec }
    }

    /// One chat call. Returns the assistant message object from the first
    /// choice (callers inspect `content` / `tool_calls` themselves).
    pub async fn chat(&self, messages: &[Value], tools: &[Value]) -> Result<Value> {
        let mut body = serde_json::json!({
            "model": self.spec.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }

        let url = format!("{}/chat/completions", self.spec.base_url.trim_end_matches('/'));
        debug!("Chat call to {} (model={})", url, self.spec.model);

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.spec.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let excerpt: String = detail.chars().take(300).collect();
            return Err(anyhow!("model API returned {status}: {excerpt}"));
        }

        let json: Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .cloned()
            .ok_or_else(|| anyhow!("model response had no choices"))
    }
}

/// Pull the text out of an assistant message. Handles both the plain
/// string form and the content-parts array some backends return.
pub fn extract_text(message: &Value) -> Option<String> {
    if let Some(content) = message.get("content").and_then(|c| c.as_str()) {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(parts) = message.get("content").and_then(|c| c.as_array()) {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_text() {
        let message = serde_json::json!({"role": "assistant", "content": " hello "});
        assert_eq!(extract_text(&message).unwrap(), "hello");
    }

    #[test]
    fn test_extract_content_parts() {
        let message = serde_json::json!({
            "role": "assistant",
            "content": [{"type": "text", "text": "first"}, {"type": "text", "text": "second"}]
        });
        assert_eq!(extract_text(&message).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_extract_empty_is_none() {
        let message = serde_json::json!({"role": "assistant", "content": ""});
        assert!(extract_text(&message).is_none());
        let no_content = serde_json::json!({"role": "assistant"});
        assert!(extract_text(&no_content).is_none());
    }
}
