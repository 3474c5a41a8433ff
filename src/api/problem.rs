//! Rendering of failures as problem-details bodies.

use axum::{http::StatusCode, response::Json};
use log::Level;
use serde::Serialize;

use crate::config::Environment;
use crate::logic::pipeline::RequestContext;
use crate::model::{AppError, Failure, FieldErrors};

/// `application/problem+json` shaped error body.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

pub type ApiError = (StatusCode, Json<ProblemDetails>);

fn problem_type(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "https://tools.ietf.org/html/rfc9110#section-15.5.1",
        401 => "https://tools.ietf.org/html/rfc9110#section-15.5.2",
        403 => "https://tools.ietf.org/html/rfc9110#section-15.5.4",
        404 => "https://tools.ietf.org/html/rfc9110#section-15.5.5",
        422 => "https://tools.ietf.org/html/rfc9110#section-15.5.21",
        _ => "https://tools.ietf.org/html/rfc9110#section-15.6.1",
    }
}

/// Full diagnostics in development, short messages in production. This is the
/// one place a failed request is logged.
pub fn problem_response(ctx: &RequestContext, environment: Environment, failure: &Failure) -> ApiError {
    let status = failure.status_code();
    let full = failure.to_error_messages();
    log_failure(ctx, status, &full);

    let detail = if environment.is_development() {
        full
    } else {
        failure.to_short_error_message()
    };
    let errors = if status == StatusCode::UNPROCESSABLE_ENTITY {
        failure.validation_errors().cloned()
    } else {
        None
    };

    let problem = ProblemDetails {
        problem_type: problem_type(status).to_string(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        detail,
        errors,
        trace_id: ctx.request_id.to_string(),
    };
    (status, Json(problem))
}

/// Client mistakes are warnings; only server-side failures are errors.
fn failure_level(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::Error
    } else {
        Level::Warn
    }
}

fn log_failure(ctx: &RequestContext, status: StatusCode, messages: &str) {
    ctx.logger.log(
        failure_level(status),
        format_args!("Request failed with {}: {}", status, messages),
    );
}

pub fn bad_request(ctx: &RequestContext, environment: Environment, message: String) -> ApiError {
    problem_response(ctx, environment, &Failure::from(AppError::BadRequest(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserContext;
    use std::collections::BTreeMap;

    #[test]
    fn test_validation_problem_carries_field_errors() {
        let ctx = RequestContext::new(UserContext::anonymous());
        let mut errors = BTreeMap::new();
        errors.insert("userName".to_string(), vec!["required".to_string()]);
        let failure = Failure::from(AppError::validation(errors));

        let (status, Json(problem)) = problem_response(&ctx, Environment::Production, &failure);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(problem.status, 422);
        assert_eq!(problem.errors.unwrap()["userName"], vec!["required"]);
        assert!(problem.detail.contains("Reasons:"));
        assert_eq!(problem.trace_id, ctx.request_id.to_string());
    }

    #[test]
    fn test_failures_log_at_status_dependent_level() {
        assert_eq!(failure_level(StatusCode::NOT_FOUND), Level::Warn);
        assert_eq!(failure_level(StatusCode::UNPROCESSABLE_ENTITY), Level::Warn);
        assert_eq!(failure_level(StatusCode::INTERNAL_SERVER_ERROR), Level::Error);
        assert_eq!(failure_level(StatusCode::SERVICE_UNAVAILABLE), Level::Error);
    }

    #[test]
    fn test_not_found_problem_has_no_field_errors() {
        let ctx = RequestContext::system();
        let failure = Failure::from(AppError::not_found("User", "42"));

        let (status, Json(problem)) = problem_response(&ctx, Environment::Development, &failure);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(problem.title, "Not Found");
        assert!(problem.errors.is_none());
        assert!(problem.detail.contains("Entity \"User\" (42) was not found."));
        assert_eq!(
            problem.problem_type,
            "https://tools.ietf.org/html/rfc9110#section-15.5.5"
        );
    }
}
