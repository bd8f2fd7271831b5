use crate::cache::CacheKey;
use std::fmt;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.ttl_ms")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "coordinator_config", "infinite_scroll")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An upstream loader rejected.
///
/// Cloneable so every co-waiter of one single-flight group receives the same
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub key: Option<CacheKey>,
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            key: None,
            message: message.into(),
        }
    }

    pub fn for_key(key: &CacheKey, message: impl Into<String>) -> Self {
        Self {
            key: Some(key.clone()),
            message: message.into(),
        }
    }

    /// Attach the key unless one is already recorded.
    pub fn with_key(mut self, key: &CacheKey) -> Self {
        if self.key.is_none() {
            self.key = Some(key.clone());
        }
        self
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "load failed for {}: {}", key, self.message),
            None => write!(f, "load failed: {}", self.message),
        }
    }
}

impl std::error::Error for LoadError {}

/// Unified error type for the coordinator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Load(LoadError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

impl Error {
    /// Shorthand for a loader failure without a key; the cache attaches one.
    pub fn load(msg: impl Into<String>) -> Self {
        Error::Load(LoadError::new(msg))
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Collapse into a [`LoadError`] so it can be shared among co-waiters.
    pub fn into_load_error(self, key: &CacheKey) -> LoadError {
        match self {
            Error::Load(e) => e.with_key(key),
            other => LoadError::for_key(key, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered() {
        let err = Error::configuration_with_context(
            "threshold out of range",
            ErrorContext::new()
                .with_field_path("visibility_threshold")
                .with_source("config"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: threshold out of range (field: visibility_threshold, source: config)"
        );
        assert!(err.context().is_some());
    }

    #[test]
    fn test_into_load_error_keeps_existing_key() {
        let alice = CacheKey::profile("alice");
        let bob = CacheKey::profile("bob");
        let err = Error::Load(LoadError::for_key(&alice, "timeout"));
        let load = err.into_load_error(&bob);
        assert_eq!(load.key, Some(alice));
        assert_eq!(load.to_string(), "load failed for user:alice: timeout");
    }

    #[test]
    fn test_into_load_error_wraps_other_errors() {
        let key = CacheKey::feed(None);
        let err = Error::runtime_with_context("backend down", ErrorContext::new());
        let load = err.into_load_error(&key);
        assert_eq!(load.key, Some(key));
        assert!(load.message.contains("backend down"));
    }
}
