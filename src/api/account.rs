//! Account endpoints: registration, OTP verification, login and logout

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{RegisterUser, UserResponse},
    services::auth::IssuedToken,
};

use super::{AuthenticatedUser, BearerToken};

/// Registration response
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

/// OTP verification request
#[derive(Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    /// Six-digit code received by email
    pub code: String,
}

/// Request a new verification code
#[derive(Deserialize, ToSchema)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session opened by login or verification
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expiry_time: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn session(token: IssuedToken, user: UserResponse) -> LoginResponse {
    LoginResponse {
        access_token: token.token,
        token_type: "Bearer".to_string(),
        expiry_time: token.expiry_time,
        user,
    }
}

/// Register a new member account
#[utoipa::path(
    post,
    path = "/account/register",
    tag = "account",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or username already exists")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(request): Json<RegisterUser>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.services.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: format!("User created successfully. A verification code was sent to {}", user.email),
            user: user.into(),
        }),
    ))
}

/// Verify an account with the emailed code
#[utoipa::path(
    post,
    path = "/account/verify-otp",
    tag = "account",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified", body = LoginResponse),
        (status = 401, description = "Invalid or expired code"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Account already verified")
    )
)]
pub async fn verify_otp(
    State(state): State<crate::AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .auth
        .verify_otp(&request.email, &request.code)
        .await?;

    Ok(Json(session(token, user.into())))
}

/// Send a new verification code
#[utoipa::path(
    post,
    path = "/account/resend-otp",
    tag = "account",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "Account already verified")
    )
)]
pub async fn resend_otp(
    State(state): State<crate::AppState>,
    Json(request): Json<ResendOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth.resend_otp(&request.email).await?;

    Ok(Json(MessageResponse {
        message: "Verification code sent".to_string(),
    }))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/account/login",
    tag = "account",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials or unverified account")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(session(token, user.into())))
}

/// Logout (revokes the presented token)
#[utoipa::path(
    post,
    path = "/account/logout",
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    BearerToken(token): BearerToken,
) -> AppResult<StatusCode> {
    state.services.auth.logout(&token).await?;
    tracing::info!(user_id = %claims.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/account/me",
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.auth.get_user(claims.user_id).await?;
    Ok(Json(user.into()))
}
