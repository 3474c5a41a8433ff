use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::convert::Infallible;

use crate::model::UserContext;

/// Axum extractor for UserContext from request headers
///
/// This extractor looks for user information in request headers:
/// - Authorization: optional `Bearer <token>`, kept opaque
/// - X-User-Id: user identifier
/// - X-User-Email: Optional user email
/// - X-User-Name: Optional user display name
///
/// Requests without an X-User-Id get the anonymous context; nothing is rejected here.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(user_context_from_headers(&parts.headers))
    }
}

pub fn user_context_from_headers(headers: &HeaderMap) -> UserContext {
    let token = extract_bearer_token(headers);
    let context = match extract_header_value(headers, "x-user-id") {
        Some(user_id) => UserContext::with_details(
            user_id,
            extract_header_value(headers, "x-user-email"),
            extract_header_value(headers, "x-user-name"),
        ),
        None => UserContext::anonymous(),
    };
    context.with_token(token)
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_user_context_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("test-user-123"),
        );
        headers.insert(
            HeaderName::from_static("x-user-email"),
            HeaderValue::from_static("test@example.com"),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));

        let ctx = user_context_from_headers(&headers);
        assert_eq!(ctx.user_id, "test-user-123");
        assert_eq!(ctx.user_email, Some("test@example.com".to_string()));
        assert_eq!(ctx.user_name, None);
        assert_eq!(ctx.bearer_token.as_deref(), Some("abc.def"));
        assert!(ctx.is_authenticated());
    }

    #[test]
    fn test_missing_headers_fall_back_to_anonymous() {
        let ctx = user_context_from_headers(&HeaderMap::new());
        assert!(ctx.is_anonymous());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
