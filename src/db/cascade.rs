//! Multi-document mutations: cascade deletes, report clearing, teacher
//! reassignment and dangling-reference sweeps.
//!
//! Each operation runs in one transaction and returns the media references that
//! became unreachable. Deleting those from the media store is the caller's job,
//! after commit.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::reports::{
    delete_coordinator_report, fetch_all_coordinator_reports, fetch_coordinator_reports,
    fetch_existing_report_ids, fetch_teacher_reports_for, insert_coordinator_report,
    save_coordinator_report_refs,
};
use super::repository::{
    fetch_all_coordinators, fetch_attendance_photos, fetch_coordinator,
    fetch_coordinator_for_teacher, fetch_heads_for_coordinator, fetch_teacher, save_attendance_photos,
    save_id_list, save_staging, Repository,
};
use crate::errors::AppError;
use crate::models::{MediaRef, Role};
use crate::reports::{plan_reassignment, retain_live, ReassignmentPlan};

/// What a reconciliation sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub staged_refs: usize,
    pub committed_refs: usize,
    pub deleted_reports: usize,
    pub roster_ids: usize,
}

impl SweepStats {
    pub fn is_empty(&self) -> bool {
        *self == SweepStats::default()
    }
}

impl Repository {
    // ==================== CASCADE OPERATIONS ====================

    /// Delete a teacher with everything it owns.
    ///
    /// The teacher is detached from its coordinator first, then deleted. Its
    /// students are soft-deleted (and expire with the usual retention), its
    /// reports are deleted, and references to those reports are purged from
    /// every staging list and committed report.
    pub async fn delete_teacher_cascade(
        &self,
        teacher_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MediaRef>, AppError> {
        let mut tx = self.pool.begin().await?;

        let teacher = fetch_teacher(&mut tx, teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;

        let reports = fetch_teacher_reports_for(&mut tx, teacher_id).await?;
        let report_ids: HashSet<String> = reports.iter().map(|r| r.id.clone()).collect();

        for mut coordinator in fetch_all_coordinators(&mut tx).await? {
            if !coordinator.teachers.iter().any(|id| id == teacher_id) {
                continue;
            }
            coordinator.teachers.retain(|id| id != teacher_id);
            save_id_list(
                &mut tx,
                Role::Coordinator,
                &coordinator.id,
                "teachers",
                &coordinator.teachers,
            )
            .await?;
        }

        sqlx::query("DELETE FROM teachers WHERE id = ?")
            .bind(teacher_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE students SET active = 0, deleted_at = ?, updated_at = ? WHERE teacher_id = ? AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(teacher_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM teacher_reports WHERE teacher_id = ?")
            .bind(teacher_id)
            .execute(&mut *tx)
            .await?;

        purge_report_refs(&mut tx, &report_ids).await?;
        delete_sessions_for(&mut tx, Role::Teacher, teacher_id).await?;

        tx.commit().await?;

        let mut media: Vec<MediaRef> = reports.into_iter().flat_map(|r| r.images).collect();
        media.extend(teacher.attendance_photos.into_iter().map(|p| p.photo));
        media.push(teacher.picture);
        Ok(media)
    }

    /// Delete a coordinator and its committed reports.
    ///
    /// Teacher reports are not touched; the coordinator's teachers are left
    /// without a coordinator until reassigned.
    pub async fn delete_coordinator_cascade(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<MediaRef>, AppError> {
        let mut tx = self.pool.begin().await?;

        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        for mut head in fetch_heads_for_coordinator(&mut tx, coordinator_id).await? {
            head.coordinators.retain(|id| id != coordinator_id);
            save_id_list(&mut tx, Role::Head, &head.id, "coordinators", &head.coordinators)
                .await?;
        }

        sqlx::query("DELETE FROM coordinators WHERE id = ?")
            .bind(coordinator_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM coordinator_reports WHERE coordinator_id = ?")
            .bind(coordinator_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        delete_sessions_for(&mut tx, Role::Coordinator, coordinator_id).await?;

        tx.commit().await?;
        tracing::info!(
            coordinator_id,
            reports = removed,
            teachers = coordinator.teachers.len(),
            "Deleted coordinator"
        );

        let mut media: Vec<MediaRef> = coordinator
            .attendance_photos
            .into_iter()
            .map(|p| p.photo)
            .collect();
        media.push(coordinator.picture);
        Ok(media)
    }

    // ==================== CLEAR OPERATIONS ====================

    /// Delete a teacher's reports and reset its attendance journal.
    pub async fn clear_teacher_reports(
        &self,
        teacher_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MediaRef>, AppError> {
        let mut tx = self.pool.begin().await?;
        let media = clear_teacher_in(&mut tx, teacher_id, now).await?;
        tx.commit().await?;
        Ok(media)
    }

    /// Clear every teacher of the coordinator and stamp its report-clear date.
    pub async fn clear_coordinator_teachers(
        &self,
        coordinator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MediaRef>, AppError> {
        let mut tx = self.pool.begin().await?;

        let coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let mut media = Vec::new();
        for teacher_id in &coordinator.teachers {
            match clear_teacher_in(&mut tx, teacher_id, now).await {
                Ok(freed) => media.extend(freed),
                // Dangling roster entry; reconciliation will drop it
                Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        sqlx::query("UPDATE coordinators SET last_report_clear_date = ? WHERE id = ?")
            .bind(now)
            .bind(coordinator_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(media)
    }

    // ==================== REASSIGNMENT ====================

    /// Move a teacher, and its committed report references, to another coordinator.
    pub async fn reassign_teacher(
        &self,
        teacher_id: &str,
        new_coordinator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReassignmentPlan, AppError> {
        let mut tx = self.pool.begin().await?;

        fetch_teacher(&mut tx, teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;
        let mut target = fetch_coordinator(&mut tx, new_coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", new_coordinator_id))
            })?;

        let mut plan = ReassignmentPlan::default();

        if let Some(mut previous) = fetch_coordinator_for_teacher(&mut tx, teacher_id).await? {
            if previous.id == target.id {
                return Err(AppError::Validation(
                    "Teacher already belongs to this coordinator".to_string(),
                ));
            }

            let moving: HashMap<String, chrono::NaiveDate> =
                fetch_teacher_reports_for(&mut tx, teacher_id)
                    .await?
                    .into_iter()
                    .map(|r| (r.id, r.date))
                    .collect();

            previous.teachers.retain(|id| id != teacher_id);
            save_id_list(
                &mut tx,
                Role::Coordinator,
                &previous.id,
                "teachers",
                &previous.teachers,
            )
            .await?;

            let gone: HashSet<String> = moving.keys().cloned().collect();
            if previous.coord_report.purge(&gone) > 0 {
                save_staging(&mut tx, &previous.id, &previous.coord_report).await?;
            }

            let old_reports = fetch_coordinator_reports(&mut tx, &previous.id).await?;
            let new_reports = fetch_coordinator_reports(&mut tx, &target.id).await?;
            plan = plan_reassignment(&moving, &old_reports, &new_reports, &target.id, now);

            for (id, refs) in &plan.shrunk {
                save_coordinator_report_refs(&mut tx, id, refs).await?;
            }
            for id in &plan.emptied {
                delete_coordinator_report(&mut tx, id).await?;
            }
            for (id, refs) in &plan.extended {
                save_coordinator_report_refs(&mut tx, id, refs).await?;
            }
            for report in &plan.created {
                insert_coordinator_report(&mut tx, report).await?;
            }
        }

        target.teachers.push(teacher_id.to_string());
        save_id_list(
            &mut tx,
            Role::Coordinator,
            &target.id,
            "teachers",
            &target.teachers,
        )
        .await?;

        tx.commit().await?;
        tracing::info!(
            teacher_id,
            coordinator_id = new_coordinator_id,
            moved = plan.moved_count(),
            emptied = plan.emptied.len(),
            "Reassigned teacher"
        );
        Ok(plan)
    }

    // ==================== RECONCILIATION ====================

    /// Remove references that no longer resolve: staged and committed report
    /// references, and roster entries for deleted teachers and coordinators.
    /// Committed reports left empty are deleted.
    pub async fn sweep_dangling_refs(&self) -> Result<SweepStats, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut stats = SweepStats::default();

        let teacher_ids: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT id FROM teachers")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();
        let coordinator_ids: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT id FROM coordinators")
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        for mut coordinator in fetch_all_coordinators(&mut tx).await? {
            let live = fetch_existing_report_ids(&mut tx, &coordinator.coord_report.report_ids())
                .await?;
            let dropped = coordinator.coord_report.sweep(&live);
            if dropped > 0 {
                stats.staged_refs += dropped;
                save_staging(&mut tx, &coordinator.id, &coordinator.coord_report).await?;
            }

            let before = coordinator.teachers.len();
            coordinator.teachers.retain(|id| teacher_ids.contains(id));
            if coordinator.teachers.len() != before {
                stats.roster_ids += before - coordinator.teachers.len();
                save_id_list(
                    &mut tx,
                    Role::Coordinator,
                    &coordinator.id,
                    "teachers",
                    &coordinator.teachers,
                )
                .await?;
            }
        }

        let head_rows = sqlx::query_as::<_, (String, String)>("SELECT id, coordinators FROM heads")
            .fetch_all(&mut *tx)
            .await?;
        for (head_id, raw) in head_rows {
            let mut ids: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
            let before = ids.len();
            ids.retain(|id| coordinator_ids.contains(id));
            if ids.len() != before {
                stats.roster_ids += before - ids.len();
                save_id_list(&mut tx, Role::Head, &head_id, "coordinators", &ids).await?;
            }
        }

        for mut report in fetch_all_coordinator_reports(&mut tx).await? {
            let ids: Vec<String> = report
                .teacher_reports
                .iter()
                .map(|r| r.report_id.clone())
                .collect();
            let live = fetch_existing_report_ids(&mut tx, &ids).await?;
            let dropped = retain_live(&mut report.teacher_reports, &live);
            if dropped == 0 {
                continue;
            }
            stats.committed_refs += dropped;
            if report.teacher_reports.is_empty() {
                delete_coordinator_report(&mut tx, &report.id).await?;
                stats.deleted_reports += 1;
            } else {
                save_coordinator_report_refs(&mut tx, &report.id, &report.teacher_reports).await?;
            }
        }

        tx.commit().await?;
        Ok(stats)
    }
}

// ==================== HELPERS ====================

async fn clear_teacher_in(
    conn: &mut SqliteConnection,
    teacher_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<MediaRef>, AppError> {
    let photos = fetch_attendance_photos(conn, Role::Teacher, teacher_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;

    let reports = fetch_teacher_reports_for(conn, teacher_id).await?;
    let report_ids: HashSet<String> = reports.iter().map(|r| r.id.clone()).collect();

    sqlx::query("DELETE FROM teacher_reports WHERE teacher_id = ?")
        .bind(teacher_id)
        .execute(&mut *conn)
        .await?;
    purge_report_refs(conn, &report_ids).await?;
    save_attendance_photos(conn, Role::Teacher, teacher_id, &[], Some(now)).await?;

    tracing::info!(
        teacher_id,
        reports = reports.len(),
        photos = photos.len(),
        "Cleared teacher reports"
    );

    let mut media: Vec<MediaRef> = reports.into_iter().flat_map(|r| r.images).collect();
    media.extend(photos.into_iter().map(|p| p.photo));
    Ok(media)
}

/// Drop references to deleted reports from every staging list and committed
/// report, deleting committed reports that end up empty.
async fn purge_report_refs(
    conn: &mut SqliteConnection,
    gone: &HashSet<String>,
) -> Result<(), AppError> {
    if gone.is_empty() {
        return Ok(());
    }

    for mut coordinator in fetch_all_coordinators(conn).await? {
        if coordinator.coord_report.purge(gone) > 0 {
            save_staging(conn, &coordinator.id, &coordinator.coord_report).await?;
        }
    }

    for mut report in fetch_all_coordinator_reports(conn).await? {
        let before = report.teacher_reports.len();
        report.teacher_reports.retain(|r| !gone.contains(&r.report_id));
        if report.teacher_reports.len() == before {
            continue;
        }
        if report.teacher_reports.is_empty() {
            delete_coordinator_report(conn, &report.id).await?;
        } else {
            save_coordinator_report_refs(conn, &report.id, &report.teacher_reports).await?;
        }
    }
    Ok(())
}

async fn delete_sessions_for(
    conn: &mut SqliteConnection,
    role: Role,
    principal_id: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE role = ? AND principal_id = ?")
        .bind(role.as_str())
        .bind(principal_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
