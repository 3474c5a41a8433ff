//! Error kinds raised by collaborators and the typed failures handed back to callers.
//!
//! `AppError` is what goes wrong. `TypedError`/`Failure` is what a caller gets
//! back: a categorised, non-empty list of errors that keeps the underlying
//! `AppError` as its cause for diagnostics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Field name -> messages, as reported by a failed validation.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const VALIDATION_FAILURES_MESSAGE: &str = "One or more validation failures have occurred.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ForbiddenAccess(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },

    #[error("{0}")]
    ConfigError(String),

    #[error("{0}")]
    ElasticOperation(String),

    #[error("{0}")]
    InvalidStatus(String),

    #[error("{0}")]
    ObjectAlreadyExists(String),

    #[error("{0}")]
    ServiceNotAvailable(String),

    #[error("{0}")]
    ArgumentNull(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, key: impl fmt::Display) -> Self {
        Self::NotFound(format!("Entity \"{}\" ({}) was not found.", entity, key))
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation {
            message: VALIDATION_FAILURES_MESSAGE.to_string(),
            errors,
        }
    }

    /// Validation error for a single field.
    pub fn invalid_field(property: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(property.to_string(), vec![message.to_string()]);
        Self::Validation {
            message: message.to_string(),
            errors,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// The closed set of typed error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ArgumentNull,
    BadRequest,
    ConfigError,
    ElasticOperation,
    ForbiddenAccess,
    InvalidOperation,
    InvalidStatus,
    NotFound,
    ObjectAlreadyExists,
    ServiceNotAvailable,
    Validation,
    InternalServer,
}

impl ErrorKind {
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::ArgumentNull => "Argument null",
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::ConfigError => "Configuration error",
            ErrorKind::ElasticOperation => "Elastic operation failed",
            ErrorKind::ForbiddenAccess => "Forbidden",
            ErrorKind::InvalidOperation => "Invalid operation",
            ErrorKind::InvalidStatus => "Invalid status",
            ErrorKind::NotFound => "Not found",
            ErrorKind::ObjectAlreadyExists => "Object already exists",
            ErrorKind::ServiceNotAvailable => "Service not available",
            ErrorKind::Validation => "Validation failed",
            ErrorKind::InternalServer => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Metadata keys attached to typed errors.
pub mod metadata_keys {
    pub const VALIDATION_PROPERTY: &str = "ValidationProperty";
}

/// A categorised error with an optional cause and free-form metadata.
#[derive(Debug, Clone)]
pub struct TypedError {
    kind: ErrorKind,
    message: String,
    cause: Option<Arc<AppError>>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TypedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn caused_by(mut self, cause: AppError) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }
}

impl fmt::Display for TypedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {}", cause)?;
            let mut source = std::error::Error::source(cause.as_ref());
            while let Some(inner) = source {
                write!(f, " <- {}", inner)?;
                source = inner.source();
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A failed outcome: one or more typed errors, never empty.
#[derive(Debug, Clone)]
pub struct Failure {
    errors: Vec<TypedError>,
}

pub type AppResult<T> = Result<T, Failure>;

impl Failure {
    pub fn new(error: TypedError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Build from a list of errors; `None` when the list is empty.
    pub fn from_errors(errors: Vec<TypedError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[TypedError] {
        &self.errors
    }

    pub fn merge(mut self, other: Failure) -> Self {
        self.errors.extend(other.errors);
        self
    }

    pub fn causes(&self) -> impl Iterator<Item = &AppError> {
        self.errors.iter().filter_map(TypedError::cause)
    }

    /// Field errors of the first validation cause, if any.
    pub fn validation_errors(&self) -> Option<&FieldErrors> {
        self.causes().find_map(|cause| match cause {
            AppError::Validation { errors, .. } => Some(errors),
            _ => None,
        })
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(TypedError::message).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_never_empty() {
        assert!(Failure::from_errors(Vec::new()).is_none());
        let failure = Failure::from_errors(vec![TypedError::new(ErrorKind::NotFound, "gone")]);
        assert_eq!(failure.map(|f| f.errors().len()), Some(1));
    }

    #[test]
    fn test_typed_error_display_includes_cause() {
        let error = TypedError::new(ErrorKind::NotFound, "Exception has been raised")
            .caused_by(AppError::not_found("User", "42"));
        assert_eq!(
            error.to_string(),
            "NotFound: Exception has been raised (caused by: Entity \"User\" (42) was not found.)"
        );
    }

    #[test]
    fn test_validation_errors_are_exposed() {
        let mut errors = FieldErrors::new();
        errors.insert("user_name".to_string(), vec!["must not be empty".to_string()]);
        let failure = Failure::new(
            TypedError::new(ErrorKind::Validation, "invalid").caused_by(AppError::validation(errors)),
        );
        let found = failure.validation_errors().unwrap();
        assert_eq!(found["user_name"], vec!["must not be empty".to_string()]);
    }
}
