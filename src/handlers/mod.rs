// HTTP handler modules
pub mod auth_handler;
pub mod case_handler;
pub mod health;

use actix_web::{http::header, HttpRequest};

use crate::auth::SessionIdentity;
use crate::error::AppError;
use crate::server::app_state::AppState;

/// Token from an `Authorization: Bearer <token>` header, if present
pub fn extract_bearer_token(req: &HttpRequest) -> Option<&str> {
    let raw = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, rest) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the request's bearer token and return the caller's identity
pub fn authenticate(req: &HttpRequest, state: &AppState) -> Result<SessionIdentity, AppError> {
    let token = extract_bearer_token(req)
        .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;
    state.auth.verify_session(token).map_err(AppError::from)
}
