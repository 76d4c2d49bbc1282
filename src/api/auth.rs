// =============================================================================
// Bearer Session Authentication: Axum extractor
// =============================================================================
//
// Extracts the `Authorization: Bearer <token>` header and validates it with the
// `SessionGuard` held in `AppState`.
//
// Usage:
//
//   async fn handler(auth: AuthBearer, ...) { ... }
//
// A missing, malformed, forged, expired or revoked token short-circuits the
// request with 401 before the handler body executes.
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app_state::AppState;
use crate::session::SessionClaims;

/// A validated session: the raw token plus its claims.
#[derive(Debug, Clone)]
pub struct AuthBearer {
    pub token: String,
    pub claims: SessionClaims,
}

/// Rejection returned when authentication fails.
#[derive(Debug)]
pub struct AuthRejection {
    message: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "code": "UNAUTHORIZED",
        });
        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

/// Pull the token out of an `Authorization` header value.
fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthBearer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| {
                warn!("missing or malformed Authorization header");
                AuthRejection {
                    message: "Missing or invalid authorization token".to_string(),
                }
            })?;

        let claims = state.session_guard.verify(token).map_err(|e| {
            warn!(error = %e, "session rejected");
            AuthRejection {
                message: format!("Invalid authorization token: {e}"),
            }
        })?;

        Ok(AuthBearer {
            token: token.to_string(),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer  padded "), Some("padded"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
