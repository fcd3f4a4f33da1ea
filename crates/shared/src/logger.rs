//! Logger interface for dependency injection

use std::collections::HashMap;

/// Structured metadata attached to a log line
pub type LogMeta = HashMap<String, String>;

/// Build a metadata map from key/value pairs
pub fn meta<const N: usize>(pairs: [(&str, &str); N]) -> LogMeta {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Logger interface for dependency injection
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, meta: Option<&LogMeta>);
    fn info(&self, message: &str, meta: Option<&LogMeta>);
    fn warn(&self, message: &str, meta: Option<&LogMeta>);
    fn error(&self, message: &str, meta: Option<&LogMeta>);
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

fn render(meta: Option<&LogMeta>) -> String {
    match meta {
        Some(m) if !m.is_empty() => {
            let mut pairs: Vec<_> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            pairs.sort();
            pairs.join(" ")
        }
        _ => String::new(),
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str, meta: Option<&LogMeta>) {
        tracing::debug!(meta = %render(meta), "{}", message);
    }

    fn info(&self, message: &str, meta: Option<&LogMeta>) {
        tracing::info!(meta = %render(meta), "{}", message);
    }

    fn warn(&self, message: &str, meta: Option<&LogMeta>) {
        tracing::warn!(meta = %render(meta), "{}", message);
    }

    fn error(&self, message: &str, meta: Option<&LogMeta>) {
        tracing::error!(meta = %render(meta), "{}", message);
    }
}

/// No-op logger for testing
#[derive(Debug, Clone, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _message: &str, _meta: Option<&LogMeta>) {}
    fn info(&self, _message: &str, _meta: Option<&LogMeta>) {}
    fn warn(&self, _message: &str, _meta: Option<&LogMeta>) {}
    fn error(&self, _message: &str, _meta: Option<&LogMeta>) {}
}
