//! Domain error taxonomy
//!
//! Every rule in this crate fails with one of these kinds. The backend maps
//! them one-to-one onto HTTP status codes.

use thiserror::Error;

/// Failure of a domain rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An entity the caller referenced does not exist (or is not visible)
    #[error("{0} not found")]
    NotFound(String),

    /// The request itself is malformed or violates a business rule
    #[error("{message}")]
    BadRequest {
        field: Option<String>,
        message: String,
    },

    /// The request is valid but conflicts with the current state
    #[error("{message}")]
    Conflict { resource: String, message: String },

    /// The acting party is not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        DomainError::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        DomainError::BadRequest {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::BadRequest {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Forbidden(message.into())
    }

    /// Short machine-readable kind, used in logs and tests
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::BadRequest { .. } => "bad_request",
            DomainError::Conflict { .. } => "conflict",
            DomainError::Forbidden(_) => "forbidden",
        }
    }
}

/// Result alias for domain rules
pub type DomainResult<T> = Result<T, DomainError>;
