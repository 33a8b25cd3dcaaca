//! Students, lecture reports, staging lists and committed reports.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{
    fetch_coordinator, fetch_teacher, json_column, save_id_list, save_staging, to_json,
    Repository,
};
use crate::errors::AppError;
use crate::models::{
    CoordinatorReport, CoordinatorReportView, NewTeacherReport, ReportRef, Role, StagingList,
    Student, TeacherReport,
};

const TEACHER_REPORT_COLUMNS: &str = "id, teacher_id, date, time, address, attendance, attendance_count, teacher_present, student_attendance, activity, images, created_at";

impl Repository {
    // ==================== STUDENT OPERATIONS ====================

    /// Add a student to the teacher's roster, enforcing the active limit.
    pub async fn create_student(
        &self,
        teacher_id: &str,
        name: &str,
        max_students: usize,
    ) -> Result<Student, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut teacher = fetch_teacher(&mut tx, teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM students WHERE teacher_id = ? AND active = 1",
        )
        .bind(teacher_id)
        .fetch_one(&mut *tx)
        .await?;
        if active as usize >= max_students {
            return Err(AppError::Validation(format!(
                "A teacher can have at most {} students",
                max_students
            )));
        }

        let now = Utc::now();
        let student = Student {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            teacher_id: teacher_id.to_string(),
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO students (id, name, teacher_id, active, deleted_at, created_at, updated_at) VALUES (?, ?, ?, 1, NULL, ?, ?)",
        )
        .bind(&student.id)
        .bind(&student.name)
        .bind(&student.teacher_id)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&mut *tx)
        .await?;

        teacher.students.push(student.id.clone());
        save_id_list(&mut tx, Role::Teacher, teacher_id, "students", &teacher.students).await?;

        tx.commit().await?;
        Ok(student)
    }

    /// Active students with the given IDs, in creation order.
    pub async fn list_students(&self, ids: &[String]) -> Result<Vec<Student>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM students WHERE active = 1 AND id IN (SELECT value FROM json_each(?)) ORDER BY created_at",
        )
        .bind(to_json(ids)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(student_from_row).collect())
    }

    #[cfg(test)]
    pub async fn get_student(&self, id: &str) -> Result<Option<Student>, AppError> {
        let row = sqlx::query("SELECT * FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(student_from_row))
    }

    /// Soft-delete a student and drop it from its teacher's roster.
    pub async fn soft_delete_student(
        &self,
        teacher_id: &str,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE students SET active = 0, deleted_at = ?, updated_at = ? WHERE id = ? AND teacher_id = ? AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(student_id)
        .bind(teacher_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Student {} not found", student_id)));
        }

        if let Some(mut teacher) = fetch_teacher(&mut tx, teacher_id).await? {
            teacher.students.retain(|id| id != student_id);
            save_id_list(&mut tx, Role::Teacher, teacher_id, "students", &teacher.students)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Hard-delete students soft-deleted at or before the cutoff.
    pub async fn purge_expired_students(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM students WHERE active = 0 AND deleted_at IS NOT NULL AND deleted_at <= ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== TEACHER REPORT OPERATIONS ====================

    /// Persist a lecture report, snapshotting attendance over the current roster.
    pub async fn create_teacher_report(
        &self,
        submission: NewTeacherReport,
    ) -> Result<TeacherReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let teacher = fetch_teacher(&mut tx, &submission.teacher_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Teacher {} not found", submission.teacher_id))
            })?;

        let (student_attendance, attendance_count) = submission.attendance_for(&teacher.students);
        let report = TeacherReport {
            id: uuid::Uuid::new_v4().to_string(),
            teacher_id: submission.teacher_id,
            date: submission.date,
            time: submission.time,
            address: submission.address,
            attendance: submission.attendance,
            attendance_count,
            teacher_present: submission.teacher_present,
            student_attendance,
            activity: submission.activity,
            images: submission.images,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO teacher_reports (id, teacher_id, date, time, address, attendance, attendance_count, teacher_present, student_attendance, activity, images, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.teacher_id)
        .bind(report.date)
        .bind(report.time)
        .bind(&report.address)
        .bind(&report.attendance)
        .bind(report.attendance_count)
        .bind(report.teacher_present)
        .bind(to_json(&report.student_attendance)?)
        .bind(&report.activity)
        .bind(to_json(&report.images)?)
        .bind(report.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(report)
    }

    pub async fn get_teacher_report(&self, id: &str) -> Result<Option<TeacherReport>, AppError> {
        let sql = format!("SELECT {} FROM teacher_reports WHERE id = ?", TEACHER_REPORT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(teacher_report_from_row))
    }

    /// A teacher's reports, newest first, optionally from `since` onwards.
    pub async fn list_teacher_reports(
        &self,
        teacher_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<TeacherReport>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let mut reports = fetch_teacher_reports_for(&mut conn, teacher_id).await?;
        if let Some(from) = since {
            reports.retain(|r| r.date >= from);
        }
        Ok(reports)
    }

    /// Reports with the given IDs, in the given order. Unresolved IDs are skipped.
    pub async fn list_teacher_reports_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<TeacherReport>, AppError> {
        let sql = format!(
            "SELECT {} FROM teacher_reports WHERE id IN (SELECT value FROM json_each(?))",
            TEACHER_REPORT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_json(ids)?)
            .fetch_all(&self.pool)
            .await?;
        let mut found: Vec<TeacherReport> = rows.iter().map(teacher_report_from_row).collect();
        found.sort_by_key(|r| ids.iter().position(|id| *id == r.id));
        Ok(found)
    }

    // ==================== STAGING OPERATIONS ====================

    /// The coordinator's staging list, with unresolved references swept out.
    pub async fn get_staging(&self, coordinator_id: &str) -> Result<StagingList, AppError> {
        let mut tx = self.pool.begin().await?;
        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let mut staging = coordinator.coord_report;
        let live = fetch_existing_report_ids(&mut tx, &staging.report_ids()).await?;
        let dropped = staging.sweep(&live);
        if dropped > 0 {
            tracing::info!(coordinator_id, dropped, "Swept unresolved staged reports");
            save_staging(&mut tx, coordinator_id, &staging).await?;
        }
        tx.commit().await?;
        Ok(staging)
    }

    /// Stage one of the coordinator's teachers' reports. Staging twice is a no-op.
    pub async fn stage_report(
        &self,
        coordinator_id: &str,
        report_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StagingList, AppError> {
        let mut tx = self.pool.begin().await?;
        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let report = fetch_teacher_report(&mut tx, report_id)
            .await?
            .filter(|r| coordinator.teachers.contains(&r.teacher_id))
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;
        let teacher_name = fetch_teacher(&mut tx, &report.teacher_id)
            .await?
            .map(|t| t.username)
            .unwrap_or_default();

        let mut staging = coordinator.coord_report;
        if staging.stage(report_id, &teacher_name, now) {
            save_staging(&mut tx, coordinator_id, &staging).await?;
        }
        tx.commit().await?;
        Ok(staging)
    }

    /// Remove a report from the staging list.
    pub async fn unstage_report(
        &self,
        coordinator_id: &str,
        report_id: &str,
    ) -> Result<StagingList, AppError> {
        let mut tx = self.pool.begin().await?;
        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let mut staging = coordinator.coord_report;
        if !staging.unstage(report_id) {
            return Err(AppError::NotFound(format!(
                "Report {} is not staged",
                report_id
            )));
        }
        save_staging(&mut tx, coordinator_id, &staging).await?;
        tx.commit().await?;
        Ok(staging)
    }

    /// Commit the staging list as a new coordinator report.
    ///
    /// Insert and reset happen in one transaction: if the report cannot be
    /// saved the staging list is left exactly as it was.
    pub async fn commit_staging(
        &self,
        coordinator_id: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CoordinatorReport, AppError> {
        let mut tx = self.pool.begin().await?;
        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let mut staging = coordinator.coord_report;
        let live = fetch_existing_report_ids(&mut tx, &staging.report_ids()).await?;
        staging.sweep(&live);

        let report = staging.commit(coordinator_id, name, now)?;
        insert_coordinator_report(&mut tx, &report).await?;
        save_staging(&mut tx, coordinator_id, &staging).await?;

        tx.commit().await?;
        tracing::info!(
            coordinator_id,
            report_id = %report.id,
            items = report.teacher_reports.len(),
            "Committed coordinator report"
        );
        Ok(report)
    }

    // ==================== COORDINATOR REPORT OPERATIONS ====================

    /// A coordinator's committed reports, newest first.
    pub async fn list_coordinator_reports(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<CoordinatorReport>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_coordinator_reports(&mut conn, coordinator_id).await
    }

    /// Committed reports with their lecture reports resolved.
    pub async fn coordinator_report_views(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<CoordinatorReportView>, AppError> {
        let reports = self.list_coordinator_reports(coordinator_id).await?;
        let mut views = Vec::with_capacity(reports.len());
        for report in reports {
            let ids: Vec<String> = report
                .teacher_reports
                .iter()
                .map(|r| r.report_id.clone())
                .collect();
            let lectures = self.list_teacher_reports_by_ids(&ids).await?;
            views.push(CoordinatorReportView { report, lectures });
        }
        Ok(views)
    }
}

// ==================== ROW HELPERS ====================

fn student_from_row(row: &SqliteRow) -> Student {
    Student {
        id: row.get("id"),
        name: row.get("name"),
        teacher_id: row.get("teacher_id"),
        active: row.get("active"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn teacher_report_from_row(row: &SqliteRow) -> TeacherReport {
    TeacherReport {
        id: row.get("id"),
        teacher_id: row.get("teacher_id"),
        date: row.get("date"),
        time: row.get("time"),
        address: row.get("address"),
        attendance: row.get("attendance"),
        attendance_count: row.get("attendance_count"),
        teacher_present: row.get("teacher_present"),
        student_attendance: json_column(row, "student_attendance"),
        activity: row.get("activity"),
        images: json_column(row, "images"),
        created_at: row.get("created_at"),
    }
}

fn coordinator_report_from_row(row: &SqliteRow) -> CoordinatorReport {
    CoordinatorReport {
        id: row.get("id"),
        coordinator_id: row.get("coordinator_id"),
        name: row.get("name"),
        date: row.get("date"),
        teacher_reports: json_column(row, "teacher_reports"),
        created_at: row.get("created_at"),
    }
}

// ==================== CONNECTION-SCOPED HELPERS ====================

pub(super) async fn fetch_teacher_report(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<TeacherReport>, AppError> {
    let sql = format!("SELECT {} FROM teacher_reports WHERE id = ?", TEACHER_REPORT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(teacher_report_from_row))
}

pub(super) async fn fetch_teacher_reports_for(
    conn: &mut SqliteConnection,
    teacher_id: &str,
) -> Result<Vec<TeacherReport>, AppError> {
    let sql = format!(
        "SELECT {} FROM teacher_reports WHERE teacher_id = ? ORDER BY date DESC, created_at DESC",
        TEACHER_REPORT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(teacher_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(teacher_report_from_row).collect())
}

/// The subset of `ids` that still resolve to a teacher report.
pub(super) async fn fetch_existing_report_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashSet<String>, AppError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let found: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM teacher_reports WHERE id IN (SELECT value FROM json_each(?))",
    )
    .bind(to_json(ids)?)
    .fetch_all(&mut *conn)
    .await?;
    Ok(found.into_iter().collect())
}

pub(super) async fn fetch_coordinator_reports(
    conn: &mut SqliteConnection,
    coordinator_id: &str,
) -> Result<Vec<CoordinatorReport>, AppError> {
    let rows = sqlx::query(
        "SELECT * FROM coordinator_reports WHERE coordinator_id = ? ORDER BY date DESC, created_at DESC",
    )
    .bind(coordinator_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(coordinator_report_from_row).collect())
}

pub(super) async fn fetch_all_coordinator_reports(
    conn: &mut SqliteConnection,
) -> Result<Vec<CoordinatorReport>, AppError> {
    let rows = sqlx::query("SELECT * FROM coordinator_reports")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(coordinator_report_from_row).collect())
}

pub(super) async fn insert_coordinator_report(
    conn: &mut SqliteConnection,
    report: &CoordinatorReport,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO coordinator_reports (id, coordinator_id, name, date, teacher_reports, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&report.id)
    .bind(&report.coordinator_id)
    .bind(&report.name)
    .bind(report.date)
    .bind(to_json(&report.teacher_reports)?)
    .bind(report.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn save_coordinator_report_refs(
    conn: &mut SqliteConnection,
    report_id: &str,
    refs: &[ReportRef],
) -> Result<(), AppError> {
    sqlx::query("UPDATE coordinator_reports SET teacher_reports = ? WHERE id = ?")
        .bind(to_json(refs)?)
        .bind(report_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn delete_coordinator_report(
    conn: &mut SqliteConnection,
    report_id: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM coordinator_reports WHERE id = ?")
        .bind(report_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
