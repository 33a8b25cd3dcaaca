//! Coordinator endpoints: teacher management, report staging and commit.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use super::teacher::{teacher_overview, TeacherOverview};
use super::{success, ApiResult, Empty, WindowQuery};
use crate::attendance::{attendance_ratio, reset_reference, AttendanceRatio};
use crate::auth::{check_new_password, hash_password, CurrentCoordinator};
use crate::errors::AppError;
use crate::lifecycle;
use crate::models::{
    CommitReportRequest, Coordinator, CoordinatorReport, CoordinatorReportView, RegisterRequest,
    StageReportRequest, StagingList, Teacher, TeacherReport,
};
use crate::AppState;

/// A teacher as listed on a coordinator's dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub teacher: Teacher,
    pub attendance: AttendanceRatio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorHome {
    pub coordinator: Coordinator,
    pub teachers: Vec<TeacherSummary>,
    pub staging: StagingList,
    pub reports: Vec<CoordinatorReport>,
}

/// 404 unless the teacher is on the coordinator's roster.
fn ensure_own_teacher(coordinator: &Coordinator, teacher_id: &str) -> Result<(), AppError> {
    if coordinator.teachers.iter().any(|id| id == teacher_id) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Teacher {} not found", teacher_id)))
    }
}

/// GET /coordinator/home - Teachers with attendance ratios, staging list and reports.
pub async fn coordinator_home(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
) -> ApiResult<CoordinatorHome> {
    let now = Utc::now();
    let teachers = state
        .repo
        .list_teachers(&coordinator.teachers)
        .await?
        .into_iter()
        .map(|teacher| {
            let reset = reset_reference([
                teacher.last_attendance_reset_date,
                Some(coordinator.last_report_clear_date),
            ]);
            let attendance = attendance_ratio(&teacher.attendance_photos, reset, now);
            TeacherSummary {
                teacher,
                attendance,
            }
        })
        .collect();

    let staging = state.repo.get_staging(&coordinator.id).await?;
    let reports = state.repo.list_coordinator_reports(&coordinator.id).await?;

    success(CoordinatorHome {
        coordinator,
        teachers,
        staging,
        reports,
    })
}

// ==================== TEACHERS ====================

/// POST /coordinator/teachers - Create a teacher assigned to this coordinator.
pub async fn create_teacher(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Teacher> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    check_new_password(&request.password, &request.password)?;

    let hash = hash_password(&request.password)?;
    let teacher = state
        .repo
        .create_teacher(&coordinator.id, username, &hash)
        .await?;
    tracing::info!(coordinator_id = %coordinator.id, teacher_id = %teacher.id, "Teacher created");
    success(teacher)
}

/// GET /coordinator/teachers/{id} - One teacher's overview.
pub async fn get_teacher_overview(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<TeacherOverview> {
    ensure_own_teacher(&coordinator, &id)?;
    let teacher = state
        .repo
        .get_teacher(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", id)))?;
    success(teacher_overview(&state.repo, teacher, query.days).await?)
}

/// DELETE /coordinator/teachers/{id} - Delete a teacher and everything it owns.
pub async fn delete_teacher(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    ensure_own_teacher(&coordinator, &id)?;
    lifecycle::delete_teacher(&state.repo, state.media.as_ref(), &id).await?;
    success(Empty {})
}

/// POST /coordinator/teachers/{id}/clear - Delete a teacher's reports and photos.
pub async fn clear_teacher(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    ensure_own_teacher(&coordinator, &id)?;
    lifecycle::clear_teacher(&state.repo, state.media.as_ref(), &id).await?;
    success(Empty {})
}

/// POST /coordinator/clear - Clear every teacher and stamp the report-clear date.
pub async fn clear_all_teachers(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
) -> ApiResult<Empty> {
    lifecycle::clear_all_teachers(&state.repo, state.media.as_ref(), &coordinator.id).await?;
    success(Empty {})
}

/// GET /coordinator/lectures/{id} - A report of one of this coordinator's teachers.
pub async fn get_teacher_lecture(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Path(id): Path<String>,
) -> ApiResult<TeacherReport> {
    let report = state
        .repo
        .get_teacher_report(&id)
        .await?
        .filter(|r| coordinator.teachers.contains(&r.teacher_id))
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
    success(report)
}

// ==================== STAGING ====================

/// GET /coordinator/staging - The staging list.
pub async fn get_staging(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
) -> ApiResult<StagingList> {
    success(state.repo.get_staging(&coordinator.id).await?)
}

/// POST /coordinator/staging - Stage a teacher report.
pub async fn stage_report(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Json(request): Json<StageReportRequest>,
) -> ApiResult<StagingList> {
    let staging = state
        .repo
        .stage_report(&coordinator.id, &request.report_id, Utc::now())
        .await?;
    success(staging)
}

/// DELETE /coordinator/staging/{reportId} - Remove a staged report.
pub async fn unstage_report(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Path(report_id): Path<String>,
) -> ApiResult<StagingList> {
    success(state.repo.unstage_report(&coordinator.id, &report_id).await?)
}

// ==================== COMMITTED REPORTS ====================

/// POST /coordinator/reports - Commit the staging list.
pub async fn commit_report(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
    Json(request): Json<CommitReportRequest>,
) -> ApiResult<CoordinatorReport> {
    let report = state
        .repo
        .commit_staging(&coordinator.id, request.name.as_deref(), Utc::now())
        .await?;
    success(report)
}

/// GET /coordinator/reports - Committed reports with their lectures.
pub async fn list_committed_reports(
    State(state): State<AppState>,
    CurrentCoordinator(coordinator): CurrentCoordinator,
) -> ApiResult<Vec<CoordinatorReportView>> {
    success(state.repo.coordinator_report_views(&coordinator.id).await?)
}
