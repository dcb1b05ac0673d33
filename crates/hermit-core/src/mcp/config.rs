//! MCP server-list document
//!
//! `mcp_config.json` holds a `mcpServers` key in either of the two shapes
//! found in the wild: a mapping of name → entry, or an array of entries
//! that carry their own `name` field. Array entries without a name are
//! skipped with a warning; they never reach the orchestrator.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Transport-specific connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpTransport {
    /// Streamable-HTTP endpoint
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    /// Spawned subprocess speaking MCP over stdio
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
}

impl McpTransport {
    /// Short label for status output
    pub fn kind(&self) -> &'static str {
        match self {
            McpTransport::Http { .. } => "http",
            McpTransport::Stdio { .. } => "stdio",
        }
    }
}

/// One configured server. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: McpTransport,
}

/// Entry as it appears in the document; `name` is only present in array form.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(flatten)]
    transport: McpTransport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawServers {
    Map(BTreeMap<String, RawEntry>),
    List(Vec<RawEntry>),
}

impl Default for RawServers {
    fn default() -> Self {
        RawServers::List(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawDocument {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: RawServers,
}

/// Parsed server list
#[derive(Debug, Clone, Default)]
pub struct McpConfig {
    pub servers: Vec<McpServerConfig>,
}

impl McpConfig {
    /// Load from `path`. A missing file is an empty config (run with no
    /// tool servers), not an error; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("{} not found, running without MCP servers", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse the document content.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: RawDocument = serde_json::from_str(content)?;

        let mut servers = Vec::new();
        match doc.mcp_servers {
            RawServers::Map(entries) => {
                for (name, entry) in entries {
                    servers.push(McpServerConfig {
                        name,
                        transport: entry.transport,
                    });
                }
            }
            RawServers::List(entries) => {
                for entry in entries {
                    match entry.name {
                        Some(name) if !name.trim().is_empty() => servers.push(McpServerConfig {
                            name,
                            transport: entry.transport,
                        }),
                        _ => warn!("Skipping MCP server entry without a 'name' field"),
                    }
                }
            }
        }

        Ok(Self { servers })
    }

    /// Write back in map form, pretty-printed (the web config editor reads
    /// and rewrites this file).
    pub fn save(&self, path: &Path) -> Result<()> {
        let entries: BTreeMap<String, RawEntry> = self
            .servers
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    RawEntry {
                        name: None,
                        transport: s.transport.clone(),
                    },
                )
            })
            .collect();
        let doc = RawDocument {
            mcp_servers: RawServers::Map(entries),
        };

        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map_form() {
        let content = r#"{
            "mcpServers": {
                "naver-search": {
                    "command": "python",
                    "args": ["src/naver_mcp_server.py"]
                }
            }
        }"#;

        let config = McpConfig::parse(content).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "naver-search");
        assert_eq!(config.servers[0].transport.kind(), "stdio");
    }

    #[test]
    fn test_parse_array_form_with_http() {
        let content = r#"{
            "mcpServers": [
                {
                    "name": "newsapi",
                    "url": "http://localhost:8931/mcp",
                    "headers": {"Authorization": "Bearer abc"}
                }
            ]
        }"#;

        let config = McpConfig::parse(content).unwrap();
        assert_eq!(config.servers.len(), 1);
        match &config.servers[0].transport {
            McpTransport::Http { url, headers } => {
                assert_eq!(url, "http://localhost:8931/mcp");
                assert_eq!(headers.get("Authorization").unwrap(), "Bearer abc");
            }
            other => panic!("expected http transport, got {other:?}"),
        }
    }

    #[test]
    fn test_nameless_array_entries_are_skipped() {
        let content = r#"{
            "mcpServers": [
                {"url": "http://localhost:8931/mcp"},
                {"name": "good", "command": "uvx", "args": ["some-server"]},
                {"name": "  ", "command": "uvx"}
            ]
        }"#;

        let config = McpConfig::parse(content).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "good");
    }

    #[test]
    fn test_empty_document() {
        let config = McpConfig::parse("{}").unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let config = McpConfig::load(Path::new("/nonexistent/mcp_config.json")).unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_config.json");

        let config = McpConfig {
            servers: vec![
                McpServerConfig {
                    name: "stdio-server".to_string(),
                    transport: McpTransport::Stdio {
                        command: "uvx".to_string(),
                        args: vec!["some-server".to_string()],
                    },
                },
                McpServerConfig {
                    name: "http-server".to_string(),
                    transport: McpTransport::Http {
                        url: "http://localhost:9000/mcp".to_string(),
                        headers: BTreeMap::new(),
                    },
                },
            ],
        };

        config.save(&path).unwrap();
        let loaded = McpConfig::load(&path).unwrap();
        assert_eq!(loaded.servers.len(), 2);
        assert!(loaded.servers.iter().any(|s| s.name == "stdio-server"));
        assert!(loaded.servers.iter().any(|s| s.name == "http-server"));
    }
}
