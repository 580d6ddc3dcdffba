//! Error types for provider construction and data retrieval.
//!
//! [`DataError`] covers both tiers of the error policy. Construction failures
//! ([`DataError::DependencyMissing`], [`DataError::BackendUnreachable`],
//! [`DataError::MissingConfig`], [`DataError::InvalidConfig`],
//! [`DataError::UnsupportedProvider`]) are returned to the caller. Everything
//! else is raised inside adapters, logged, and turned into "no data" before it
//! reaches the provider interface.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that can occur while building a provider or fetching data.
#[derive(Error, Debug)]
pub enum DataError {
    /// The backend SDK binding is not available in this process.
    #[error("Backend dependency missing: {0}")]
    DependencyMissing(String),

    /// The backend was found but could not be reached.
    #[error("Backend {backend} unreachable: {reason}")]
    BackendUnreachable {
        /// Backend that failed to connect.
        backend: String,
        /// Reason reported by the connector.
        reason: String,
    },

    /// A configuration value required by the selected mode is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested provider kind is unknown.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A call into the backend SDK failed.
    #[error("Backend call failed: {0}")]
    Backend(String),

    /// The operation is not available for this backend or mode.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// DataFrame manipulation failed.
    #[error("DataFrame error: {0}")]
    Frame(#[from] PolarsError),

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns true for errors raised while constructing a provider.
    ///
    /// These are the only errors the provider factory hands back to callers.
    #[must_use]
    pub const fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::DependencyMissing(_)
                | Self::BackendUnreachable { .. }
                | Self::MissingConfig(_)
                | Self::InvalidConfig(_)
                | Self::UnsupportedProvider(_)
        )
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_errors() {
        assert!(DataError::DependencyMissing("terminal".into()).is_construction());
        assert!(
            DataError::BackendUnreachable {
                backend: "quotes".into(),
                reason: "timeout".into(),
            }
            .is_construction()
        );
        assert!(DataError::MissingConfig("data_dir".into()).is_construction());
        assert!(!DataError::Backend("boom".into()).is_construction());
        assert!(!DataError::NotSupported("sectors".into()).is_construction());
    }

    #[test]
    fn test_display() {
        let err = DataError::BackendUnreachable {
            backend: "terminal".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Backend terminal unreachable: connection refused"
        );
    }
}
