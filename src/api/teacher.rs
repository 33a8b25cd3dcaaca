//! Teacher endpoints: roster, lecture submission and the teacher's own reports.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::{store_images, teacher_reset, success, ApiResult, Empty, FormData, WindowQuery};
use crate::attendance::{
    attendance_ratio, summarize_students, window_start, AttendanceRatio, StudentAttendanceSummary,
};
use crate::auth::CurrentTeacher;
use crate::db::Repository;
use crate::errors::AppError;
use crate::lifecycle::release_media;
use crate::media::MediaFolder;
use crate::models::{
    CreateStudentRequest, NewTeacherReport, Student, Teacher, TeacherReport,
    MAX_REPORT_IMAGES,
};
use crate::AppState;

/// Dashboard for one teacher, also served to its coordinator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherOverview {
    pub teacher: Teacher,
    pub attendance: AttendanceRatio,
    pub students: Vec<StudentAttendanceSummary>,
    pub reports: Vec<TeacherReport>,
}

/// Build a teacher's overview, bounding reports to the last `days` IST days when given.
pub async fn teacher_overview(
    repo: &Repository,
    teacher: Teacher,
    days: Option<u32>,
) -> Result<TeacherOverview, AppError> {
    let now = Utc::now();
    let since = days.map(|d| window_start(d, now));

    let roster = repo.list_students(&teacher.students).await?;
    let reports = repo.list_teacher_reports(&teacher.id, since).await?;
    let students = summarize_students(&roster, &reports, since);

    let reset = teacher_reset(repo, &teacher).await?;
    let attendance = attendance_ratio(&teacher.attendance_photos, reset, now);

    Ok(TeacherOverview {
        teacher,
        attendance,
        students,
        reports,
    })
}

/// GET /teacher/home - Attendance ratio, per-student summaries and reports.
pub async fn teacher_home(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Query(query): Query<WindowQuery>,
) -> ApiResult<TeacherOverview> {
    success(teacher_overview(&state.repo, teacher, query.days).await?)
}

// ==================== STUDENTS ====================

/// GET /teacher/students - Active roster.
pub async fn list_students(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
) -> ApiResult<Vec<Student>> {
    success(state.repo.list_students(&teacher.students).await?)
}

/// POST /teacher/students - Add a student.
pub async fn add_student(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Json(request): Json<CreateStudentRequest>,
) -> ApiResult<Student> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Student name is required".to_string()));
    }

    let student = state
        .repo
        .create_student(&teacher.id, name, state.config.max_students)
        .await?;
    success(student)
}

/// DELETE /teacher/students/{id} - Soft-delete a student.
pub async fn delete_student(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    state
        .repo
        .soft_delete_student(&teacher.id, &id, Utc::now())
        .await?;
    tracing::info!(teacher_id = %teacher.id, student_id = %id, "Student removed");
    success(Empty {})
}

// ==================== LECTURES ====================

/// POST /teacher/lectures - Submit a lecture report with 1 to 5 images.
pub async fn submit_lecture(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    multipart: Multipart,
) -> ApiResult<TeacherReport> {
    let mut form = FormData::read(multipart).await?;

    let images = form.take_files("images");
    if images.is_empty() {
        return Err(AppError::Validation(
            "At least one image is required".to_string(),
        ));
    }
    if images.len() > MAX_REPORT_IMAGES {
        return Err(AppError::Validation(format!(
            "At most {} images are allowed",
            MAX_REPORT_IMAGES
        )));
    }

    let date = form
        .text("date")
        .ok_or_else(|| AppError::Validation("Date is required".to_string()))
        .and_then(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| AppError::Validation("Date must be YYYY-MM-DD".to_string()))
        })?;
    let time = form
        .text("time")
        .map(|raw| {
            NaiveTime::parse_from_str(&raw, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
                .map_err(|_| AppError::Validation("Time must be HH:MM".to_string()))
        })
        .transpose()?;
    let teacher_present = form
        .text("teacherPresent")
        .is_some_and(|v| v == "on" || v == "true");

    let stored = store_images(state.media.as_ref(), MediaFolder::Lectures, "images", images).await?;

    let submission = NewTeacherReport {
        teacher_id: teacher.id.clone(),
        date,
        time,
        address: form.text("address"),
        attendance: form.text("attendance"),
        teacher_present,
        present_student_ids: form.texts("studentAttendance"),
        activity: form.text("activity"),
        images: stored.clone(),
    };

    match state.repo.create_teacher_report(submission).await {
        Ok(report) => {
            tracing::info!(
                teacher_id = %teacher.id,
                report_id = %report.id,
                present = report.attendance_count,
                "Lecture submitted"
            );
            success(report)
        }
        Err(e) => {
            release_media(state.media.as_ref(), stored).await;
            Err(e)
        }
    }
}

/// GET /teacher/reports - The teacher's reports, newest first.
pub async fn list_reports(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<TeacherReport>> {
    let since = query.days.map(|d| window_start(d, Utc::now()));
    success(state.repo.list_teacher_reports(&teacher.id, since).await?)
}

/// GET /teacher/reports/{id} - One of the teacher's reports.
pub async fn get_report(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(id): Path<String>,
) -> ApiResult<TeacherReport> {
    let report = state
        .repo
        .get_teacher_report(&id)
        .await?
        .filter(|r| r.teacher_id == teacher.id)
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
    success(report)
}
