//! Teardown-noise classification
//!
//! Closing a generation of servers produces a burst of expected transport
//! errors (cancelled tasks, already-closed pipes). Those are normal
//! consequences of tearing down concurrent resources, so shutdown paths
//! consult this classifier and log matches at debug instead of error. The
//! underlying error paths stay intact; only the log level changes.

use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Substrings that mark an error as expected teardown noise. Matching is
/// case-insensitive.
const DEFAULT_PATTERNS: &[&str] = &[
    "cancelled",
    "canceled",
    "transport closed",
    "connection closed",
    "channel closed",
    "broken pipe",
    "task was cancelled",
];

static PATTERNS: Lazy<RwLock<Vec<String>>> = Lazy::new(|| {
    RwLock::new(DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect())
});

/// Add a suppression pattern at runtime (deployment-specific transports
/// produce deployment-specific shutdown messages).
pub fn add_pattern(pattern: &str) {
    let mut patterns = PATTERNS.write().expect("noise pattern lock poisoned");
    patterns.push(pattern.to_lowercase());
}

/// True if the message looks like expected shutdown noise.
pub fn is_benign_disconnect(message: &str) -> bool {
    let message = message.to_lowercase();
    let patterns = PATTERNS.read().expect("noise pattern lock poisoned");
    patterns.iter().any(|p| message.contains(p.as_str()))
}

/// Log a teardown error at the appropriate level.
pub fn log_teardown_error(server: &str, err: &anyhow::Error) {
    let message = format!("{err:#}");
    if is_benign_disconnect(&message) {
        tracing::debug!("Closing '{}': {}", server, message);
    } else {
        tracing::error!("Error closing '{}': {}", server, message);
    }
}
