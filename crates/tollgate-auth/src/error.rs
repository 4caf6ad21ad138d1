//! Authorization error types.
//!
//! Access-control decisions (`Forbidden`, `Unauthorized`) are kept apart from
//! programming mistakes (`PolicyConflict`, `Configuration`, `TypeMismatch`)
//! and broken policies (`PolicyExecution`) so the surrounding pipeline can
//! translate each into the right status class.

use std::fmt;

/// Errors produced while registering policies or authorizing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Access denied and the request carries no identity.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the denial.
        message: String,
    },

    /// Access denied for an authenticated identity.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of the denial.
        message: String,
    },

    /// Two registered policies claim the same name in the same scope.
    #[error("Policy conflict: {first} conflicts with {second}")]
    PolicyConflict {
        /// Description of the first policy.
        first: String,
        /// Description of the second policy.
        second: String,
    },

    /// Metadata is missing or inconsistent (entity provider, primary id, unknown type).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A response value does not have the shape its declared type promises.
    #[error("Type mismatch: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A policy evaluator failed.
    #[error("{message}")]
    PolicyExecution {
        /// Location-qualified description including the cause.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates the denial matching the identity state of the request:
    /// `Forbidden` without an identity, `Unauthorized` with one.
    #[must_use]
    pub fn denied(authenticated: bool, message: Option<String>) -> Self {
        if authenticated {
            Self::unauthorized(message.unwrap_or_else(|| "Unauthorized".to_string()))
        } else {
            Self::forbidden(message.unwrap_or_else(|| "Forbidden".to_string()))
        }
    }

    /// Creates a new `PolicyConflict` error.
    #[must_use]
    pub fn policy_conflict(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::PolicyConflict {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `TypeMismatch` error.
    #[must_use]
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Creates a new `PolicyExecution` error.
    #[must_use]
    pub fn policy_execution(message: impl Into<String>) -> Self {
        Self::PolicyExecution {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an access-control denial (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::Unauthorized { .. })
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden { .. } => 403,
            Self::Unauthorized { .. } => 401,
            Self::PolicyConflict { .. }
            | Self::Configuration { .. }
            | Self::TypeMismatch { .. }
            | Self::PolicyExecution { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Forbidden { .. } | Self::Unauthorized { .. } => ErrorCategory::Authorization,
            Self::PolicyConflict { .. } | Self::Configuration { .. } => {
                ErrorCategory::Configuration
            }
            Self::TypeMismatch { .. } => ErrorCategory::Validation,
            Self::PolicyExecution { .. } => ErrorCategory::Policy,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Short machine-readable error kind used in response bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::Unauthorized { .. } => "unauthorized",
            Self::PolicyConflict { .. } => "policy_conflict",
            Self::Configuration { .. } => "configuration",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::PolicyExecution { .. } => "policy_execution",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Categories of authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Access-control decisions.
    Authorization,
    /// Broken metadata or conflicting registrations.
    Configuration,
    /// Runtime values not matching declared types.
    Validation,
    /// Policy evaluators that failed.
    Policy,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "authorization"),
            Self::Configuration => write!(f, "configuration"),
            Self::Validation => write!(f, "validation"),
            Self::Policy => write!(f, "policy"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
