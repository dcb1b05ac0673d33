//! Agent instruction loading

use std::path::Path;

use tracing::warn;

/// Shipped default, used when no prompt file is deployed.
const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant. Answer the user's questions \
directly. When the question needs current information, use the available search tools and cite \
what you found.";

/// Read instructions from `path`, falling back to the embedded default.
/// An unreadable file is worth a warning but never blocks initialization.
pub fn load_instructions(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                warn!("Prompt file {} is empty, using default", path.display());
                DEFAULT_INSTRUCTIONS.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => {
            warn!(
                "Prompt file {} not found, using default instructions",
                path.display()
            );
            DEFAULT_INSTRUCTIONS.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.txt");
        std::fs::write(&path, "Answer in haiku.\n").unwrap();

        assert_eq!(load_instructions(&path), "Answer in haiku.");
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let instructions = load_instructions(&dir.path().join("nope.txt"));
        assert!(instructions.contains("helpful AI assistant"));
    }

    #[test]
    fn test_blank_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.txt");
        std::fs::write(&path, "   \n\n").unwrap();

        assert!(load_instructions(&path).contains("helpful AI assistant"));
    }
}
