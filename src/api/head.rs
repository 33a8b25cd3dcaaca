//! Head endpoints: coordinator management and teacher reassignment.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use super::{coordinator_reset, success, ApiResult, Empty};
use crate::attendance::{attendance_ratio, AttendanceRatio};
use crate::auth::{check_new_password, hash_password, CurrentHead};
use crate::errors::AppError;
use crate::lifecycle::{self, release_media};
use crate::models::{
    Coordinator, CoordinatorReportView, Head, ReassignTeacherRequest,
    RegisterRequest, Role, TeacherReport,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSummary {
    pub coordinator: Coordinator,
    pub attendance: AttendanceRatio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadHome {
    pub head: Head,
    pub coordinators: Vec<CoordinatorSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentSummary {
    pub teacher_id: String,
    pub coordinator_id: String,
    pub moved: usize,
    pub created_reports: usize,
    pub deleted_reports: usize,
}

fn ensure_own_coordinator(head: &Head, coordinator_id: &str) -> Result<(), AppError> {
    if head.coordinators.iter().any(|id| id == coordinator_id) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "Coordinator {} not found",
            coordinator_id
        )))
    }
}

/// GET /head/home - Coordinators with attendance ratios.
pub async fn head_home(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
) -> ApiResult<HeadHome> {
    let now = Utc::now();
    let coordinators = state
        .repo
        .list_coordinators(&head.coordinators)
        .await?
        .into_iter()
        .map(|coordinator| {
            let reset = coordinator_reset(&coordinator);
            let attendance = attendance_ratio(&coordinator.attendance_photos, reset, now);
            CoordinatorSummary {
                coordinator,
                attendance,
            }
        })
        .collect();
    success(HeadHome { head, coordinators })
}

/// POST /head/coordinators - Create a coordinator under this head.
pub async fn create_coordinator(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Coordinator> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    check_new_password(&request.password, &request.password)?;

    let hash = hash_password(&request.password)?;
    let coordinator = state
        .repo
        .create_coordinator(&head.id, username, &hash)
        .await?;
    tracing::info!(head_id = %head.id, coordinator_id = %coordinator.id, "Coordinator created");
    success(coordinator)
}

/// GET /head/coordinators/{id}/reports - A coordinator's committed reports.
pub async fn get_coordinator_reports(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
    Path(id): Path<String>,
) -> ApiResult<Vec<CoordinatorReportView>> {
    ensure_own_coordinator(&head, &id)?;
    success(state.repo.coordinator_report_views(&id).await?)
}

/// DELETE /head/coordinators/{id} - Delete a coordinator and its committed reports.
pub async fn delete_coordinator(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    ensure_own_coordinator(&head, &id)?;
    lifecycle::delete_coordinator(&state.repo, state.media.as_ref(), &id).await?;
    success(Empty {})
}

/// POST /head/coordinators/{id}/clear-attendance - Reset a coordinator's photo journal.
pub async fn clear_coordinator_attendance(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    ensure_own_coordinator(&head, &id)?;
    let photos = state
        .repo
        .clear_attendance_photos(Role::Coordinator, &id, Utc::now())
        .await?;
    let released = release_media(
        state.media.as_ref(),
        photos.into_iter().map(|p| p.photo).collect(),
    )
    .await;
    tracing::info!(coordinator_id = %id, released, "Cleared coordinator attendance");
    success(Empty {})
}

/// POST /head/teachers/{id}/reassign - Move a teacher to another coordinator.
pub async fn reassign_teacher(
    State(state): State<AppState>,
    CurrentHead(head): CurrentHead,
    Path(teacher_id): Path<String>,
    Json(request): Json<ReassignTeacherRequest>,
) -> ApiResult<ReassignmentSummary> {
    ensure_own_coordinator(&head, &request.coordinator_id)?;

    // Orphaned teachers may be claimed; assigned ones only from this head's coordinators
    if let Some(current) = state.repo.find_coordinator_for_teacher(&teacher_id).await? {
        if !head.coordinators.contains(&current.id) {
            return Err(AppError::NotFound(format!(
                "Teacher {} not found",
                teacher_id
            )));
        }
    }

    let plan = state
        .repo
        .reassign_teacher(&teacher_id, &request.coordinator_id, Utc::now())
        .await?;

    success(ReassignmentSummary {
        moved: plan.moved_count(),
        created_reports: plan.created.len(),
        deleted_reports: plan.emptied.len(),
        teacher_id,
        coordinator_id: request.coordinator_id,
    })
}

/// GET /head/lectures/{id} - Any teacher report.
pub async fn get_lecture(
    State(state): State<AppState>,
    CurrentHead(_head): CurrentHead,
    Path(id): Path<String>,
) -> ApiResult<TeacherReport> {
    let report = state
        .repo
        .get_teacher_report(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
    success(report)
}
