use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::AppError;
use crate::handlers::authenticate;
use crate::server::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PinLoginRequest {
    pub email: String,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> ActixResult<HttpResponse> {
    let receipt = state
        .auth
        .register(&body.username, &body.email, &body.password)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Accepted().json(json!({
        "message": "Registration successful! Please check your email for a verification code.",
        "email": receipt.email,
        "expiresAt": receipt.expires_at,
    })))
}

/// POST /api/auth/verify
pub async fn verify(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> ActixResult<HttpResponse> {
    let account = state
        .auth
        .verify(&body.email, &body.code)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Account verified successfully! You can now log in.",
        "account": account,
    })))
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ActixResult<HttpResponse> {
    let session = state
        .auth
        .login(&body.email, &body.password)
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /api/auth/pin
pub async fn request_pin(
    state: web::Data<AppState>,
    body: web::Json<PinRequest>,
) -> ActixResult<HttpResponse> {
    let receipt = state
        .auth
        .request_pin(&body.email)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Accepted().json(json!({
        "message": "PIN sent to your email address.",
        "email": receipt.email,
        "expiresAt": receipt.expires_at,
    })))
}

/// POST /api/auth/pin/login
pub async fn login_with_pin(
    state: web::Data<AppState>,
    body: web::Json<PinLoginRequest>,
) -> ActixResult<HttpResponse> {
    let session = state
        .auth
        .login_with_pin(&body.email, &body.pin)
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /api/auth/password (bearer)
pub async fn change_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> ActixResult<HttpResponse> {
    let identity = authenticate(&req, &state)?;
    state
        .auth
        .change_password(&identity.email, &body.current_password, &body.new_password)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated." })))
}

/// GET /api/auth/session (bearer)
pub async fn session(req: HttpRequest, state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let identity = authenticate(&req, &state)?;
    debug!("Session lookup for {}", identity.email);
    Ok(HttpResponse::Ok().json(identity))
}
