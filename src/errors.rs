//! Error handling for the SafeTravels risk core
//!
//! Terminal failures carry enough context (stage, operation, reason) to be
//! reported to a caller verbatim. Degradations of optional collaborators are
//! modelled as variants too so they can be logged uniformly, but the review
//! workflow never returns them as a terminal error.

use thiserror::Error;

/// Main error type for the risk core
#[derive(Error, Debug)]
pub enum SafeTravelsError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid route: {reason}")]
    InvalidRoute { reason: String },

    #[error("Routing provider unavailable: {message}")]
    RoutingUnavailable { message: String },

    #[error("Retrieval degraded: {message}")]
    RetrievalDegraded { message: String },

    #[error("Synthesis degraded: {message}")]
    SynthesisDegraded { message: String },

    #[error("Operation timed out: {operation} after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<SafeTravelsError>,
    },

    #[error("Database operation failed: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network operation failed: {operation}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with SafeTravelsError
pub type SafeTravelsResult<T> = Result<T, SafeTravelsError>;

impl SafeTravelsError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid route error
    pub fn invalid_route(reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            reason: reason.into(),
        }
    }

    /// Create a routing unavailable error
    pub fn routing_unavailable(message: impl Into<String>) -> Self {
        Self::RoutingUnavailable {
            message: message.into(),
        }
    }

    pub fn retrieval_degraded(message: impl Into<String>) -> Self {
        Self::RetrievalDegraded {
            message: message.into(),
        }
    }

    pub fn synthesis_degraded(message: impl Into<String>) -> Self {
        Self::SynthesisDegraded {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis: duration.as_millis() as u64,
        }
    }

    /// Attach the name of the failing stage to a terminal error
    pub fn in_stage(stage: impl Into<String>, source: SafeTravelsError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Create a database error
    pub fn database(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stage name for errors wrapped with [`SafeTravelsError::in_stage`]
    pub fn stage(&self) -> Option<&str> {
        match self {
            SafeTravelsError::Stage { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }

    /// Innermost error, unwrapping any stage annotations
    pub fn root(&self) -> &SafeTravelsError {
        match self {
            SafeTravelsError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Helper trait for safe mutex operations
pub trait SafeLock<T: ?Sized> {
    /// Lock a mutex, returning a SafeTravelsError on poison
    fn safe_lock(&self) -> SafeTravelsResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self) -> SafeTravelsResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| SafeTravelsError::MutexPoisoned {
            resource: "generic_mutex".to_string(),
        })
    }
}

/// Convert from sled errors
impl From<sled::Error> for SafeTravelsError {
    fn from(err: sled::Error) -> Self {
        SafeTravelsError::database("sled_operation", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for SafeTravelsError {
    fn from(err: serde_json::Error) -> Self {
        SafeTravelsError::serialization("json_operation", err)
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for SafeTravelsError {
    fn from(err: std::io::Error) -> Self {
        SafeTravelsError::io("io_operation", err)
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for SafeTravelsError {
    fn from(err: reqwest::Error) -> Self {
        SafeTravelsError::network("http_request", err)
    }
}

impl From<toml::de::Error> for SafeTravelsError {
    fn from(err: toml::de::Error) -> Self {
        SafeTravelsError::config(format!("invalid TOML: {err}"))
    }
}

impl From<figment::Error> for SafeTravelsError {
    fn from(err: figment::Error) -> Self {
        SafeTravelsError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = SafeTravelsError::config("Missing configuration file");
        assert!(config_err.to_string().contains("Configuration error"));

        let route_err = SafeTravelsError::invalid_route("empty coordinate sequence");
        assert!(route_err.to_string().contains("Invalid route"));
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = SafeTravelsError::io("reading factor table", io_err);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("I/O operation failed"));
    }

    #[test]
    fn test_stage_wrapping_keeps_root() {
        let err = SafeTravelsError::in_stage(
            "planning",
            SafeTravelsError::routing_unavailable("provider returned 503"),
        );
        assert_eq!(err.stage(), Some("planning"));
        assert!(matches!(err.root(), SafeTravelsError::RoutingUnavailable { .. }));
        assert!(err.to_string().starts_with("planning stage failed"));
    }

    #[test]
    fn test_degradation_messages() {
        let err = SafeTravelsError::retrieval_degraded("index offline");
        assert_eq!(err.to_string(), "Retrieval degraded: index offline");
        let err = SafeTravelsError::synthesis_degraded("llm 500");
        assert_eq!(err.to_string(), "Synthesis degraded: llm 500");
        assert_eq!(err.stage(), None);
    }
}
