//! REST API module.
//!
//! Contains all routes and handlers, grouped by the role that may call them.

mod account;
mod auth;
mod coordinator;
mod head;
mod teacher;

pub use account::*;
pub use auth::*;
pub use coordinator::*;
pub use head::*;
pub use teacher::*;

use std::collections::HashMap;

use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attendance::{attendance_ratio, reset_reference, AttendanceRatio};
use crate::db::Repository;
use crate::errors::AppError;
use crate::lifecycle::release_media;
use crate::media::{image_extension, MediaFolder, MediaStore};
use crate::models::{Coordinator, MediaRef, Principal, Teacher};

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Empty object payload for mutations with nothing to return.
#[derive(Debug, Serialize)]
pub struct Empty {}

/// `?days=N` bound on report windows: the last N IST days including today.
/// `0` is treated like `1` (today only); a missing value means no bound.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
}

// ==================== ATTENDANCE HELPERS ====================

/// Reset reference for a principal's attendance ratio: the latest of its own
/// reset date and the relevant report-clear date (the teacher's coordinator,
/// or the coordinator itself).
pub async fn attendance_reset_for(
    repo: &Repository,
    principal: &Principal,
) -> Result<Option<DateTime<Utc>>, AppError> {
    Ok(match principal {
        Principal::Teacher(teacher) => teacher_reset(repo, teacher).await?,
        Principal::Coordinator(coordinator) => coordinator_reset(coordinator),
        Principal::Head(head) => head.last_attendance_reset_date,
    })
}

pub async fn teacher_reset(
    repo: &Repository,
    teacher: &Teacher,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let cleared = repo
        .find_coordinator_for_teacher(&teacher.id)
        .await?
        .map(|c| c.last_report_clear_date);
    Ok(reset_reference([teacher.last_attendance_reset_date, cleared]))
}

pub fn coordinator_reset(coordinator: &Coordinator) -> Option<DateTime<Utc>> {
    reset_reference([
        coordinator.last_attendance_reset_date,
        Some(coordinator.last_report_clear_date),
    ])
}

pub async fn ratio_for(
    repo: &Repository,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<AttendanceRatio, AppError> {
    let reset = attendance_reset_for(repo, principal).await?;
    Ok(attendance_ratio(principal.attendance_photos(), reset, now))
}

// ==================== MULTIPART FORMS ====================

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub data: Bytes,
}

/// A fully read multipart form: repeated text fields and file parts by name.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await?;
                    // Browsers send an empty part for an unused file input
                    if data.is_empty() && filename.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(UploadedFile {
                        filename: Some(filename),
                        data,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }
        Ok(form)
    }

    /// First non-blank value of a text field, trimmed.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Every non-blank value of a repeated text field.
    pub fn texts(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.take_files(name).into_iter().next()
    }
}

/// Store uploaded images under one folder. If any upload fails, the ones
/// already stored are deleted before the error is returned.
pub async fn store_images(
    store: &dyn MediaStore,
    folder: MediaFolder,
    fieldname: &str,
    files: Vec<UploadedFile>,
) -> Result<Vec<MediaRef>, AppError> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let result = match image_extension(file.filename.as_deref()) {
            Ok(ext) => store.put(folder, fieldname, &ext, file.data).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(media) => stored.push(media),
            Err(e) => {
                release_media(store, stored).await;
                return Err(e.into());
            }
        }
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::LocalMediaStore;
    use tempfile::TempDir;

    fn file(name: &str, data: &'static [u8]) -> UploadedFile {
        UploadedFile {
            filename: Some(name.to_string()),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn test_store_images_rolls_back_on_bad_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".into(), 1024);

        let result = store_images(
            &store,
            MediaFolder::Lectures,
            "images",
            vec![file("a.jpg", b"a"), file("notes.txt", b"b")],
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        let lectures = dir.path().join("Lectures");
        let leftover = std::fs::read_dir(&lectures)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_form_text_helpers() {
        let mut form = FormData::default();
        form.fields
            .insert("studentAttendance".into(), vec!["s1".into(), " ".into(), "s2 ".into()]);
        form.fields.insert("address".into(), vec!["  ".into()]);

        assert_eq!(form.texts("studentAttendance"), vec!["s1", "s2"]);
        assert_eq!(form.text("address"), None);
        assert_eq!(form.text("missing"), None);
    }
}
