//! Telegram front end
//!
//! Long polling over the raw Bot API. Each incoming message is handled on
//! its own thread so a long agent run never stalls the poll loop; the
//! handler sends a placeholder, blocks on the background loop for the
//! answer, then swaps the placeholder for the reply.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use hermit_core::agent::{dispatch_blocking, AgentRuntime, AskError};
use hermit_core::exec::BackgroundLoop;
use hermit_core::mcp::McpServerStatus;

const POLL_TIMEOUT_SECS: u64 = 30;

const WELCOME: &str = "🤖 Hi! I'm an AI agent bot.\n\
Ask me anything. If you want recent news, just ask me to search.\n\
Example: \"what are today's top headlines?\"";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Chat {
    id: i64,
}

struct BotClient {
    http: reqwest::blocking::Client,
    base: String,
}

impl BotClient {
    fn new(token: &str) -> Result<Self> {
        // Request timeout must outlast the long-poll hold time.
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;
        Ok(Self {
            http,
            base: format!("https://api.telegram.org/bot{token}"),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(payload)
            .send()?;
        let api: ApiResponse<T> = response.json()?;
        if !api.ok {
            return Err(anyhow!(
                "telegram {} failed: {}",
                method,
                api.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }
        api.result
            .ok_or_else(|| anyhow!("telegram {} returned no result", method))
    }

    fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
    }

    fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        self.call("sendMessage", &json!({"chat_id": chat_id, "text": text}))
    }

    fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<bool> {
        self.call(
            "deleteMessage",
            &json!({"chat_id": chat_id, "message_id": message_id}),
        )
    }
}

/// Poll forever. Only returns on a client construction error.
pub fn run(
    token: &str,
    background: Arc<BackgroundLoop>,
    runtime: Arc<AgentRuntime>,
) -> Result<()> {
    let client = Arc::new(BotClient::new(token)?);
    info!("🤖 Telegram bot started");

    let mut offset = 0i64;
    loop {
        let updates = match client.get_updates(offset) {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {:#}", e);
                std::thread::sleep(Duration::from_secs(3));
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text.clone() else { continue };

            let client = client.clone();
            let background = background.clone();
            let runtime = runtime.clone();
            std::thread::spawn(move || {
                if let Err(e) =
                    handle_message(&client, &background, &runtime, message.chat.id, &text)
                {
                    error!("Message handler failed: {:#}", e);
                }
            });
        }
    }
}

fn handle_message(
    client: &BotClient,
    background: &BackgroundLoop,
    runtime: &Arc<AgentRuntime>,
    chat_id: i64,
    text: &str,
) -> Result<()> {
    match text.trim() {
        "/start" => {
            client.send_message(chat_id, WELCOME)?;
            return Ok(());
        }
        "/status" => {
            let summary = status_summary(background, runtime);
            client.send_message(chat_id, &summary)?;
            return Ok(());
        }
        "/tools" => {
            let summary = tools_summary(background, runtime);
            client.send_message(chat_id, &summary)?;
            return Ok(());
        }
        _ => {}
    }

    info!("Message from chat {}: {}", chat_id, truncate_for_log(text));
    let placeholder = client.send_message(chat_id, "🔄 Thinking...")?;

    let reply = match dispatch_blocking(background, runtime, text) {
        Ok(answer) => answer,
        Err(e) => format!("❌ {e}"),
    };

    if let Err(e) = client.delete_message(chat_id, placeholder.message_id) {
        warn!("Could not delete placeholder: {:#}", e);
    }
    client.send_message(chat_id, &reply)?;
    Ok(())
}

fn status_summary(background: &BackgroundLoop, runtime: &Arc<AgentRuntime>) -> String {
    let rt = runtime.clone();
    let snapshot = background.submit(
        async move { (rt.ready().await, rt.server_reports().await) },
        Duration::from_secs(5),
    );

    let (ready, reports) = match snapshot {
        Ok(snapshot) => snapshot,
        Err(_) => return "⚠️ Status unavailable".to_string(),
    };

    let mut lines = vec![format!(
        "Agent: {}",
        if ready { "ready ✅" } else { "not ready ❌" }
    )];
    for report in reports {
        let line = match report.status {
            McpServerStatus::Connected => format!(
                "✅ {} ({}) - {} tool(s)",
                report.name,
                report.transport,
                report.tools.len()
            ),
            McpServerStatus::NoTools => {
                format!("⚠️ {} ({}) - connected, no tools", report.name, report.transport)
            }
            McpServerStatus::Failed => format!(
                "❌ {} ({}) - {}",
                report.name,
                report.transport,
                report.error.as_deref().unwrap_or("failed")
            ),
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn tools_summary(background: &BackgroundLoop, runtime: &Arc<AgentRuntime>) -> String {
    let rt = runtime.clone();
    let reports = match background.submit(
        async move { rt.server_reports().await },
        Duration::from_secs(5),
    ) {
        Ok(reports) => reports,
        Err(_) => return "⚠️ Status unavailable".to_string(),
    };

    let mut lines = Vec::new();
    for report in reports {
        if report.tools.is_empty() {
            continue;
        }
        lines.push(format!("🔧 {}:", report.name));
        for tool in &report.tools {
            if tool.description.is_empty() {
                lines.push(format!(" - {}", tool.name));
            } else {
                lines.push(format!(" - {}: {}", tool.name, tool.description));
            }
        }
    }
    if lines.is_empty() {
        "No tools available".to_string()
    } else {
        lines.join("\n")
    }
}

fn truncate_for_log(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_payload() {
        let payload = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "message_id": 12,
                    "chat": {"id": 99},
                    "text": "hello"
                }
            }]
        }"#;

        let api: ApiResponse<Vec<Update>> = serde_json::from_str(payload).unwrap();
        assert!(api.ok);
        let updates = api.result.unwrap();
        assert_eq!(updates[0].update_id, 7);
        assert_eq!(
            updates[0].message.as_ref().unwrap().text.as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_parse_error_payload() {
        let payload = r#"{"ok": false, "description": "Unauthorized"}"#;
        let api: ApiResponse<Vec<Update>> = serde_json::from_str(payload).unwrap();
        assert!(!api.ok);
        assert_eq!(api.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short"), "short");
        let long = "a".repeat(300);
        let truncated = truncate_for_log(&long);
        assert_eq!(truncated.chars().count(), 201);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_ask_errors_render_short_messages() {
        assert_eq!(
            format!("❌ {}", AskError::NotReady),
            "❌ the agent is not ready yet"
        );
        // Internal detail never reaches the chat surface.
        let rendered = format!("❌ {}", AskError::Execution("stack trace".to_string()));
        assert_eq!(rendered, "❌ processing failed");
    }
}
