//! Authentication: password hashing, cookie sessions and the pre-shared key
//! that guards head registration.
//!
//! Key comparison is constant-time to mitigate timing attacks.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use once_cell::sync::Lazy;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Coordinator, Head, Principal, Teacher};
use crate::AppState;

/// Header name for the bootstrap key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

// ==================== PRE-SHARED KEY ====================

/// PSK layer function that takes the expected key as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no key is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                AppError::Unauthorized("Invalid API key".to_string()).into_response()
            }
        }
        None => {
            // Also check Authorization header as bearer token
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => AppError::Unauthorized("Missing or invalid API key".to_string())
                    .into_response(),
            }
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ==================== PASSWORDS ====================

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Hash checked for unknown usernames so a failed login costs the same
/// whether or not the account exists.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("fieldops-dummy").ok());

/// Spend one verification on the dummy hash. The outcome is discarded.
pub fn burn_password_check(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Check a password against a stored hash. A malformed hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Validate a new password and its confirmation.
pub fn check_new_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password != confirmation {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// ==================== SESSIONS ====================

/// Cookie carrying a freshly issued session token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that removes the session cookie.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// The session token on a request, if any.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Any authenticated principal.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar)
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        let (role, principal_id) = state
            .repo
            .find_session(&token, Utc::now())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session expired".to_string()))?;

        let principal = state
            .repo
            .get_principal(role, &principal_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        Ok(CurrentPrincipal(principal))
    }
}

/// An authenticated teacher.
#[derive(Debug, Clone)]
pub struct CurrentTeacher(pub Teacher);

impl FromRequestParts<AppState> for CurrentTeacher {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentPrincipal::from_request_parts(parts, state).await?.0 {
            Principal::Teacher(teacher) => Ok(CurrentTeacher(teacher)),
            other => Err(wrong_role(&other)),
        }
    }
}

/// An authenticated coordinator.
#[derive(Debug, Clone)]
pub struct CurrentCoordinator(pub Coordinator);

impl FromRequestParts<AppState> for CurrentCoordinator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentPrincipal::from_request_parts(parts, state).await?.0 {
            Principal::Coordinator(coordinator) => Ok(CurrentCoordinator(coordinator)),
            other => Err(wrong_role(&other)),
        }
    }
}

/// An authenticated head.
#[derive(Debug, Clone)]
pub struct CurrentHead(pub Head);

impl FromRequestParts<AppState> for CurrentHead {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentPrincipal::from_request_parts(parts, state).await?.0 {
            Principal::Head(head) => Ok(CurrentHead(head)),
            other => Err(wrong_role(&other)),
        }
    }
}

fn wrong_role(principal: &Principal) -> AppError {
    tracing::debug!(role = principal.role().as_str(), id = principal.id(), "Route not allowed for role");
    AppError::Forbidden(format!(
        "Not available to a {}",
        principal.role().as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not-a-hash"));
    }

    #[test]
    fn test_dummy_hash_is_a_real_argon2_hash() {
        let hash = DUMMY_HASH.as_deref().unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("secret123", hash));
        burn_password_check("secret123");
    }

    #[test]
    fn test_check_new_password() {
        assert!(check_new_password("abcdef", "abcdef").is_ok());
        assert!(matches!(
            check_new_password("abcdef", "abcdeg"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_new_password("abc", "abc"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let jar = CookieJar::new().add(cookie);
        assert_eq!(session_token(&jar).as_deref(), Some("tok"));
    }
}
