//! Error types for the broker access reconciler.
//!
//! This module provides the error hierarchy for every stage of a pass:
//! configuration, platform calls, catalog resolution and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the broker access reconciler.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cloud Controller API errors.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Catalog resolution errors.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors returned by the Cloud Controller.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The resource already exists (e.g. a plan visibility for the same plan and org).
    #[error("Conflict: {message}")]
    Conflict {
        /// Description returned by the platform.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource path or identifier.
        resource: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Cloud Controller error code, when the body carried one.
        code: Option<u32>,
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with the platform: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from the platform: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised while resolving declarations against a broker catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The broker is not registered on the platform.
    #[error("Service broker '{broker}' doesn't exist.")]
    BrokerNotFound {
        /// Broker name or id that was looked up.
        broker: String,
    },

    /// The service is not part of the broker catalog.
    #[error("Service '{service}' doesn't exist in broker '{broker}'.")]
    ServiceNotFound {
        /// Service label or id.
        service: String,
        /// Broker name.
        broker: String,
    },

    /// The plan is not part of the service.
    #[error("Plan '{plan}' doesn't exist in service '{service}'.")]
    PlanNotFound {
        /// Plan name or id.
        plan: String,
        /// Service label.
        service: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Reconciliation was aborted before any change was applied.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for broker access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

impl AccessError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the platform reported an already existing resource.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Platform(PlatformError::Conflict { .. }))
    }

    /// Returns true if the platform reported a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Platform(PlatformError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl PlatformError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, code: Option<u32>, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_render_verbatim() {
        let err = AccessError::from(CatalogError::ServiceNotFound {
            service: String::from("db"),
            broker: String::from("my-broker"),
        });
        assert_eq!(
            err.to_string(),
            "Service 'db' doesn't exist in broker 'my-broker'."
        );
    }

    #[test]
    fn test_conflict_and_not_found_helpers() {
        let conflict = AccessError::from(PlatformError::Conflict {
            message: String::from("already taken"),
        });
        assert!(conflict.is_conflict());
        assert!(!conflict.is_not_found());

        let missing = AccessError::from(PlatformError::NotFound {
            resource: String::from("/v2/service_plan_visibilities/abc"),
        });
        assert!(missing.is_not_found());
    }
}
