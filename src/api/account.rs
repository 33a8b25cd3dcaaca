//! Account settings and the photographic attendance journal, for any role.

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use super::{ratio_for, store_images, success, ApiResult, Empty, FormData};
use crate::auth::{check_new_password, hash_password, verify_password, CurrentPrincipal};
use crate::errors::AppError;
use crate::lifecycle::release_media;
use crate::media::MediaFolder;
use crate::models::{
    AttendancePhoto, GeoLocation, MediaRef, Principal, UpdatePasswordRequest,
    UpdateUsernameRequest,
};
use crate::AppState;

/// Attendance journal with its ratio.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub attendance_photos: Vec<AttendancePhoto>,
    pub present: usize,
    pub total: i64,
}

/// GET /account/settings - The signed-in principal.
pub async fn get_settings(CurrentPrincipal(principal): CurrentPrincipal) -> ApiResult<Principal> {
    success(principal)
}

/// PUT /account/username - Change the username.
pub async fn update_username(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<UpdateUsernameRequest>,
) -> ApiResult<Principal> {
    let username = request.new_username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }

    let role = principal.role();
    state
        .repo
        .update_username(role, principal.id(), username)
        .await?;

    let updated = state
        .repo
        .get_principal(role, principal.id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", role.title(), principal.id())))?;
    success(updated)
}

/// PUT /account/password - Change the password after checking the current one.
pub async fn update_password(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<UpdatePasswordRequest>,
) -> ApiResult<Empty> {
    check_new_password(&request.new_password, &request.confirm_password)?;

    let role = principal.role();
    let current = state
        .repo
        .get_password_hash(role, principal.id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", role.title(), principal.id())))?;
    if !verify_password(&request.old_password, &current) {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let hash = hash_password(&request.new_password)?;
    state
        .repo
        .update_password_hash(role, principal.id(), &hash)
        .await?;
    tracing::info!(role = role.as_str(), id = principal.id(), "Password changed");
    success(Empty {})
}

/// POST /account/picture - Replace the profile picture (multipart `photo`).
pub async fn upload_picture(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    multipart: Multipart,
) -> ApiResult<MediaRef> {
    let mut form = FormData::read(multipart).await?;
    let file = form
        .take_file("photo")
        .ok_or_else(|| AppError::Validation("A photo is required".to_string()))?;

    let role = principal.role();
    let mut stored = store_images(
        state.media.as_ref(),
        MediaFolder::profile(role),
        "photo",
        vec![file],
    )
    .await?;
    let picture = stored.remove(0);

    match state
        .repo
        .update_picture(role, principal.id(), &picture)
        .await
    {
        Ok(previous) => {
            release_media(state.media.as_ref(), vec![previous]).await;
            success(picture)
        }
        Err(e) => {
            release_media(state.media.as_ref(), vec![picture]).await;
            Err(e)
        }
    }
}

/// GET /account/attendance - Attendance photos (latest first) with the ratio.
pub async fn get_attendance(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<AttendanceView> {
    let ratio = ratio_for(&state.repo, &principal, Utc::now()).await?;

    let mut photos = principal.attendance_photos().to_vec();
    photos.sort_by(|a, b| b.date.cmp(&a.date));

    success(AttendanceView {
        attendance_photos: photos,
        present: ratio.present,
        total: ratio.total,
    })
}

/// POST /account/attendance - Upload an attendance photo (multipart
/// `attendancePhoto`, optional `latitude`, `longitude`, `address`).
pub async fn upload_attendance(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    multipart: Multipart,
) -> ApiResult<AttendancePhoto> {
    let mut form = FormData::read(multipart).await?;
    let file = form
        .take_file("attendancePhoto")
        .ok_or_else(|| AppError::Validation("An attendance photo is required".to_string()))?;
    let location = location_from_form(&form)?;

    let role = principal.role();
    let mut stored = store_images(
        state.media.as_ref(),
        MediaFolder::attendance(role),
        "attendancePhoto",
        vec![file],
    )
    .await?;

    let record = AttendancePhoto {
        id: uuid::Uuid::new_v4().to_string(),
        date: Utc::now(),
        photo: stored.remove(0),
        location,
    };

    if let Err(e) = state
        .repo
        .push_attendance_photo(role, principal.id(), &record)
        .await
    {
        release_media(state.media.as_ref(), vec![record.photo]).await;
        return Err(e);
    }
    success(record)
}

/// Location fields of an attendance upload. Without both coordinates there is
/// no location; without an address the coordinates are rendered instead.
fn location_from_form(form: &FormData) -> Result<Option<GeoLocation>, AppError> {
    let (Some(lat), Some(lon)) = (form.text("latitude"), form.text("longitude")) else {
        return Ok(None);
    };
    let latitude: f64 = lat
        .parse()
        .map_err(|_| AppError::Validation("Invalid latitude".to_string()))?;
    let longitude: f64 = lon
        .parse()
        .map_err(|_| AppError::Validation("Invalid longitude".to_string()))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::Validation("Coordinates out of range".to_string()));
    }

    let address = form
        .text("address")
        .unwrap_or_else(|| GeoLocation::coordinates_label(latitude, longitude));
    Ok(Some(GeoLocation {
        latitude,
        longitude,
        address: Some(address),
    }))
}
