//! Translation between raised errors, typed failures and HTTP status codes.

use axum::http::StatusCode;
use itertools::Itertools;

use crate::model::{metadata_keys, AppError, ErrorKind, Failure, FieldErrors, TypedError};

pub const DEFAULT_ERROR_MESSAGE: &str = "Exception has been raised";

/// Translate an error into a typed error with the default message.
pub fn map_error(error: AppError) -> TypedError {
    map_error_with(error, DEFAULT_ERROR_MESSAGE)
}

/// Translate an error into a typed error. The first matching kind wins; anything
/// not listed becomes `InternalServer`. The error itself is kept as the cause.
pub fn map_error_with(error: AppError, main_message: &str) -> TypedError {
    let kind = match &error {
        AppError::ArgumentNull(_) => ErrorKind::ArgumentNull,
        AppError::BadRequest(_) => ErrorKind::BadRequest,
        AppError::ConfigError(_) => ErrorKind::ConfigError,
        AppError::ElasticOperation(_) => ErrorKind::ElasticOperation,
        AppError::ForbiddenAccess(_) => ErrorKind::ForbiddenAccess,
        AppError::InvalidOperation(_) => ErrorKind::InvalidOperation,
        AppError::InvalidStatus(_) => ErrorKind::InvalidStatus,
        AppError::NotFound(_) => ErrorKind::NotFound,
        AppError::ObjectAlreadyExists(_) => ErrorKind::ObjectAlreadyExists,
        AppError::ServiceNotAvailable(_) => ErrorKind::ServiceNotAvailable,
        AppError::Validation { .. } => ErrorKind::Validation,
        _ => ErrorKind::InternalServer,
    };

    let mut typed = TypedError::new(kind, main_message);
    if let AppError::Validation { errors, .. } = &error {
        if !errors.is_empty() {
            let properties: Vec<serde_json::Value> =
                errors.keys().map(|key| key.clone().into()).collect();
            typed = typed.with_metadata(metadata_keys::VALIDATION_PROPERTY, properties);
        }
    }
    typed.caused_by(error)
}

/// Translate an error that is about to be returned as a failure.
pub fn map_to_failure(error: AppError) -> Failure {
    Failure::new(map_error(error))
}

impl From<AppError> for Failure {
    fn from(error: AppError) -> Self {
        map_to_failure(error)
    }
}

fn error_rank(error: &AppError) -> Option<(u8, StatusCode)> {
    match error {
        AppError::BadRequest(_) => Some((0, StatusCode::BAD_REQUEST)),
        AppError::Unauthorized(_) => Some((1, StatusCode::UNAUTHORIZED)),
        AppError::ForbiddenAccess(_) => Some((2, StatusCode::FORBIDDEN)),
        AppError::NotFound(_) => Some((3, StatusCode::NOT_FOUND)),
        AppError::Validation { .. } => Some((4, StatusCode::UNPROCESSABLE_ENTITY)),
        _ => None,
    }
}

fn kind_rank(kind: ErrorKind) -> Option<(u8, StatusCode)> {
    match kind {
        ErrorKind::BadRequest => Some((0, StatusCode::BAD_REQUEST)),
        ErrorKind::ForbiddenAccess => Some((2, StatusCode::FORBIDDEN)),
        ErrorKind::NotFound => Some((3, StatusCode::NOT_FOUND)),
        ErrorKind::Validation => Some((4, StatusCode::UNPROCESSABLE_ENTITY)),
        _ => None,
    }
}

/// Status for a set of errors: BadRequest, Unauthorized, Forbidden, NotFound,
/// Validation, in that priority; anything else is 500.
pub fn status_code_for<'a>(errors: impl IntoIterator<Item = &'a AppError>) -> StatusCode {
    errors
        .into_iter()
        .filter_map(error_rank)
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, status)| status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl Failure {
    /// HTTP status for this failure, decided by the causes of all its errors.
    /// Errors without a cause fall back to their kind.
    pub fn status_code(&self) -> StatusCode {
        self.errors()
            .iter()
            .filter_map(|error| match error.cause() {
                Some(cause) => error_rank(cause),
                None => kind_rank(error.kind()),
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, status)| status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Every error with its cause chain, one per line.
    pub fn to_error_messages(&self) -> String {
        self.errors().iter().map(ToString::to_string).join("\n")
    }

    /// Message, cause message when it differs, then the nested reasons.
    pub fn to_short_error_message(&self) -> String {
        self.errors().iter().map(short_message).join("\n")
    }
}

fn short_message(error: &TypedError) -> String {
    let mut message = error.message().to_string();
    let Some(cause) = error.cause() else {
        return message;
    };

    let cause_message = cause.to_string();
    if cause_message != message {
        message.push_str(": ");
        message.push_str(&cause_message);
    }

    let mut reasons = Vec::new();
    if let AppError::Validation { errors, .. } = cause {
        for (property, messages) in errors {
            for text in messages {
                reasons.push(format!("{}: {}", property, text));
            }
        }
    }
    let mut source = std::error::Error::source(cause);
    while let Some(inner) = source {
        reasons.push(inner.to_string());
        source = inner.source();
    }

    if !reasons.is_empty() {
        message.push_str("\nReasons:");
        for reason in reasons {
            message.push_str("\n - ");
            message.push_str(&reason);
        }
    }
    message
}

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
    /// HTTP-like error code, when the rule wants a specific outcome
    pub code: Option<u16>,
}

impl ValidationFailure {
    pub fn new(property: &str, message: &str) -> Self {
        Self {
            property: property.to_string(),
            message: message.to_string(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// 400/401/403/404/500 map to the matching error; any other code, or none,
    /// is a plain validation error on the property.
    pub fn to_error(&self) -> AppError {
        match self.code {
            Some(400) => AppError::BadRequest(self.message.clone()),
            Some(401) => AppError::Unauthorized(self.message.clone()),
            Some(403) => AppError::ForbiddenAccess(self.message.clone()),
            Some(404) => AppError::NotFound(self.message.clone()),
            Some(500) => AppError::Internal(self.message.clone()),
            _ => AppError::invalid_field(&self.property, &self.message),
        }
    }
}

/// Result of running one validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    failures: Vec<ValidationFailure>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn add_failure(&mut self, property: &str, message: &str) {
        self.failures.push(ValidationFailure::new(property, message));
    }

    pub fn add_coded_failure(&mut self, property: &str, message: &str, code: u16) {
        self.failures
            .push(ValidationFailure::new(property, message).with_code(code));
    }

    /// Record a failure when `condition` does not hold.
    pub fn check(&mut self, condition: bool, property: &str, message: &str) -> &mut Self {
        if !condition {
            self.add_failure(property, message);
        }
        self
    }

    pub fn messages(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.message.as_str()).collect()
    }

    pub fn status_code(&self) -> StatusCode {
        let errors: Vec<AppError> = self.failures.iter().map(ValidationFailure::to_error).collect();
        status_code_for(&errors)
    }
}

/// Combine validator outcomes into a single error.
///
/// An outcome resolving to 403 wins, then one resolving to 401, each carrying
/// that outcome's messages. Otherwise every failure is grouped by property
/// into one validation error.
pub fn aggregate_validation_failures(outcomes: Vec<ValidationOutcome>) -> Result<(), AppError> {
    let failing: Vec<ValidationOutcome> = outcomes
        .into_iter()
        .filter(|outcome| !outcome.is_valid())
        .collect();
    if failing.is_empty() {
        return Ok(());
    }

    if let Some(outcome) = failing
        .iter()
        .find(|outcome| outcome.status_code() == StatusCode::FORBIDDEN)
    {
        return Err(AppError::ForbiddenAccess(outcome.messages().join("\n")));
    }
    if let Some(outcome) = failing
        .iter()
        .find(|outcome| outcome.status_code() == StatusCode::UNAUTHORIZED)
    {
        return Err(AppError::Unauthorized(outcome.messages().join("\n")));
    }

    let errors: FieldErrors = failing
        .iter()
        .flat_map(ValidationOutcome::failures)
        .map(|failure| (failure.property.clone(), failure.message.clone()))
        .into_group_map()
        .into_iter()
        .collect();
    Err(AppError::validation(errors))
}
