//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::email::email_verification;
use crate::services::AuthService;
use crate::AppState;
use shared::{AuthTokens, LoginRequest, RefreshRequest, RegisterRequest, UserProfile, VerifyTokenRequest};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: UserProfile,
    pub message: String,
}

/// Register endpoint handler
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let registration = auth_service.register(body).await?;

    state.mailer.dispatch(email_verification(
        &registration.profile.email,
        &state.config.frontend_url,
        &registration.verification_token,
    ));

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: registration.profile,
            message: "Check your inbox to verify your email address".to_string(),
        }),
    ))
}

/// Email verification endpoint handler
pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyTokenRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(auth_service.verify_email(&body.token).await?))
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthTokens>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.login(&body.email, &body.password).await?;
    Ok(Json(tokens))
}

/// Token refresh endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthTokens>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh_token(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// Current user endpoint handler
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserProfile>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(auth_service.me(user.user_id).await?))
}
