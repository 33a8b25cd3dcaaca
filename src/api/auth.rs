//! Login, logout and head registration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Serialize;

use super::{success, ApiResponse, ApiResult, Empty};
use crate::auth::{
    burn_password_check, check_new_password, expired_session_cookie, hash_password,
    session_cookie, session_token, verify_password,
};
use crate::errors::AppError;
use crate::models::{Head, LoginRequest, Principal, RegisterRequest, Role};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub redirect: &'static str,
    #[serde(flatten)]
    pub principal: Principal,
}

/// POST /auth/login/{role} - Start a session for a teacher, coordinator or head.
pub async fn login(
    State(state): State<AppState>,
    Path(role): Path<String>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), AppError> {
    let role = Role::from_str(&role)
        .ok_or_else(|| AppError::NotFound(format!("Unknown role {}", role)))?;

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(AppError::invalid_credentials());
    }

    let Some((id, hash)) = state.repo.find_credentials(role, username).await? else {
        burn_password_check(&request.password);
        tracing::info!(role = role.as_str(), "Login failed");
        return Err(AppError::invalid_credentials());
    };
    if !verify_password(&request.password, &hash) {
        tracing::info!(role = role.as_str(), id = %id, "Login failed");
        return Err(AppError::invalid_credentials());
    }

    let principal = state
        .repo
        .get_principal(role, &id)
        .await?
        .ok_or_else(AppError::invalid_credentials)?;

    let token = uuid::Uuid::new_v4().to_string();
    state
        .repo
        .create_session(
            &token,
            role,
            &id,
            Utc::now(),
            Duration::hours(state.config.session_ttl_hours),
        )
        .await?;
    tracing::info!(role = role.as_str(), id = %id, "Logged in");

    let body = LoginResponse {
        redirect: role.home_path(),
        principal,
    };
    Ok((jar.add(session_cookie(token)), ApiResponse::new(body)))
}

/// POST /auth/logout - End the current session.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Empty>), AppError> {
    if let Some(token) = session_token(&jar) {
        state.repo.delete_session(&token).await?;
    }
    Ok((jar.remove(expired_session_cookie()), ApiResponse::new(Empty {})))
}

/// POST /auth/heads - Register a head. Guarded by the bootstrap key.
pub async fn register_head(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Head> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    check_new_password(&request.password, &request.password)?;

    let hash = hash_password(&request.password)?;
    let head = state.repo.create_head(username, &hash).await?;
    tracing::info!(id = %head.id, "Registered head");
    success(head)
}
