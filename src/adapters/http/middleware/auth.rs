//! Authentication middleware and extractors for axum.
//!
//! - `auth_middleware` - validates Bearer tokens and injects the caller into extensions
//! - `RequireAuth` - extractor that rejects requests without a caller
//!
//! The middleware only talks to the `SessionValidator` port, so the JWT
//! adapter and the mock used in tests are interchangeable.
//!
//! ```text
//! Request → auth_middleware → injects AuthenticatedUser into extensions
//!                                      ↓
//!                              Handler → RequireAuth extractor reads from extensions
//! ```
//!
//! Browsers cannot set headers on a WebSocket upgrade, so the token is also
//! accepted from an `access_token` query parameter.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

/// Auth middleware state - wraps the session validator.
pub type AuthState = Arc<dyn SessionValidator>;

const TOKEN_QUERY_PARAM: &str = "access_token";

/// Attaches the caller to the request when a token is present.
///
/// A missing token passes through so public routes keep working; a token
/// that fails validation is rejected here (401, or 503 if the validator is
/// unreachable).
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&request).or_else(|| query_token(&request));

    let Some(token) = token else {
        return next.run(request).await;
    };

    match validator.validate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => auth_error_response(&e),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn query_token(request: &Request) -> Option<String> {
    request.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == TOKEN_QUERY_PARAM && !value.is_empty()).then(|| value.to_string())
    })
}

fn auth_error_response(error: &AuthError) -> Response {
    match error {
        AuthError::TokenExpired => error_body(StatusCode::UNAUTHORIZED, "Token expired", "AUTH_ERROR"),
        AuthError::InvalidToken => error_body(StatusCode::UNAUTHORIZED, "Invalid token", "AUTH_ERROR"),
        AuthError::ServiceUnavailable(msg) => {
            tracing::error!(error = %msg, "Auth service unavailable");
            error_body(
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication service unavailable",
                "AUTH_ERROR",
            )
        }
    }
}

/// Handler argument that yields the caller, or a 401 when
/// `auth_middleware` did not attach one.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or(AuthRejection::Unauthenticated)
    }
}

#[derive(Debug, Clone)]
pub enum AuthRejection {
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthenticated => error_body(
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                "UNAUTHENTICATED",
            ),
        }
    }
}

fn error_body(status: StatusCode, message: &str, code: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "code": code,
            "retryable": status == StatusCode::SERVICE_UNAVAILABLE,
        })),
    )
        .into_response()
}
